use butane_api::{
    config::base::v0_5,
    ignition::v3_4,
    path::{Path, JSON, YAML},
};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::TranslateError,
    options::TranslateOptions,
    translate::{resource::read_local, Translation, Translator},
};

lazy_static! {
    static ref LINE_BREAK: Regex = Regex::new(r"\r?\n").unwrap();
}

/// Splits an authorized keys file into its non-empty lines. Comment lines
/// are kept as entries of their own.
pub(crate) fn split_keys(contents: &str) -> Vec<String> {
    LINE_BREAK
        .split(contents)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub(crate) fn translate_user(
    from: v0_5::PasswdUser,
    options: &TranslateOptions,
) -> Result<Translation<v3_4::PasswdUser>, TranslateError> {
    let (mut to, mut ts, mut r) = Translator::new(options)
        .skip("ssh_authorized_keys_local")
        .translate::<_, v3_4::PasswdUser>(&from)?;

    let keys = Path::root(JSON).append("sshAuthorizedKeys");
    for (i, local) in from.ssh_authorized_keys_local.iter().enumerate() {
        let c = Path::root(YAML).append("ssh_authorized_keys_local").append(i);
        let Some(data) = read_local(options, local, &c, &mut r) else {
            continue;
        };
        for key in split_keys(&String::from_utf8_lossy(&data)) {
            ts.add(c.clone(), keys.append(to.ssh_authorized_keys.len()));
            to.ssh_authorized_keys.push(key);
        }
    }
    if !to.ssh_authorized_keys.is_empty() && ts.get(&keys).is_none() {
        ts.add(
            Path::root(YAML).append("ssh_authorized_keys_local"),
            keys,
        );
    }
    Ok((to, ts, r))
}
