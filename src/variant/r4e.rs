//! RHEL for Edge: the base passes, minus storage features its provisioning
//! flow cannot apply.

use butane_api::{config::r4e::v1_1, error::SupportError, ignition::v3_4};

use crate::{
    error::TranslateError,
    options::TranslateBytesOptions,
    translate::Translation,
    variant::{
        base_translator,
        filters::{self, Filter},
        set_version, translate_base, Source,
    },
};

const R4E_FILTERS: &[Filter] = &[
    Filter::present("storage.disks", SupportError::Disk),
    Filter::present("storage.filesystems", SupportError::Filesystem),
    Filter::present("storage.luks", SupportError::Luks),
    Filter::present("storage.raid", SupportError::Raid),
];

impl Source for v1_1::Config {
    type Target = v3_4::Config;

    fn translate(
        self,
        options: &TranslateBytesOptions,
    ) -> Result<Translation<Self::Target>, TranslateError> {
        let options = &options.translate;
        let (mut config, mut ts, mut r) =
            translate_base(base_translator(options), &self, &self.storage, options)?;
        set_version(&mut config, &mut ts, v3_4::VERSION);
        r.merge(filters::apply(R4E_FILTERS, &config, &ts)?);
        Ok((config, ts, r))
    }
}
