//! Units and dropins whose bodies live in the files-dir.

use butane_api::{
    config::base::v0_5,
    error::TranslationError,
    ignition::v3_4,
    path::{Path, JSON, YAML},
    Report,
};

use crate::{
    error::TranslateError,
    options::TranslateOptions,
    translate::{resource::read_local, Translation, Translator},
};

fn read_body(options: &TranslateOptions, local: &str, c: &Path, r: &mut Report) -> Option<String> {
    let data = read_local(options, local, c, r)?;
    match String::from_utf8(data) {
        Ok(body) => Some(body),
        Err(_) => {
            r.add_error(
                c.clone(),
                TranslationError::LocalNotUtf8 {
                    path: local.to_string(),
                },
            );
            None
        }
    }
}

pub(crate) fn translate_unit(
    from: v0_5::Unit,
    options: &TranslateOptions,
) -> Result<Translation<v3_4::Unit>, TranslateError> {
    let (mut to, mut ts, mut r) = Translator::new(options)
        .skip("contents_local")
        .skip("dropins.*.contents_local")
        .translate::<_, v3_4::Unit>(&from)?;

    if let (None, Some(local)) = (&from.contents, &from.contents_local) {
        let c = Path::root(YAML).append("contents_local");
        if let Some(body) = read_body(options, local, &c, &mut r) {
            to.contents = Some(body);
            ts.add(c, Path::root(JSON).append("contents"));
        }
    }

    for (i, dropin) in from.dropins.iter().enumerate() {
        let (None, Some(local)) = (&dropin.contents, &dropin.contents_local) else {
            continue;
        };
        let c = Path::root(YAML)
            .append("dropins")
            .append(i)
            .append("contents_local");
        if let Some(body) = read_body(options, local, &c, &mut r) {
            if let Some(target) = to.dropins.get_mut(i) {
                target.contents = Some(body);
                ts.add(
                    c,
                    Path::root(JSON).append("dropins").append(i).append("contents"),
                );
            }
        }
    }
    Ok((to, ts, r))
}
