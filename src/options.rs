use std::sync::Arc;

use osutils::files_dir::FilesDir;

/// Options shared by every translator.
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Root that `local` references, trees, `contents_local` and
    /// `ssh_authorized_keys_local` are resolved under.
    pub files_dir: Option<Arc<dyn FilesDir>>,

    /// Always embed resources as URL-escaped text instead of trying gzip.
    pub no_resource_auto_compression: bool,

    /// Log the final translation set at debug level.
    pub debug_print_translations: bool,
}

impl TranslateOptions {
    pub fn with_files_dir(mut self, files_dir: Arc<dyn FilesDir>) -> Self {
        self.files_dir = Some(files_dir);
        self
    }

    pub fn with_no_resource_auto_compression(mut self, value: bool) -> Self {
        self.no_resource_auto_compression = value;
        self
    }

    pub fn with_debug_print_translations(mut self, value: bool) -> Self {
        self.debug_print_translations = value;
        self
    }
}

/// Options of [`translate_bytes`](crate::translate_bytes).
#[derive(Debug, Clone, Default)]
pub struct TranslateBytesOptions {
    pub translate: TranslateOptions,

    /// Indent JSON output.
    pub pretty: bool,

    /// For variants that wrap the Ignition config (openshift), emit the bare
    /// Ignition config instead.
    pub raw: bool,

    /// Treat unused keys as errors.
    pub strict: bool,
}

impl TranslateBytesOptions {
    pub fn with_translate(mut self, translate: TranslateOptions) -> Self {
        self.translate = translate;
        self
    }

    pub fn with_pretty(mut self, value: bool) -> Self {
        self.pretty = value;
        self
    }

    pub fn with_raw(mut self, value: bool) -> Self {
        self.raw = value;
        self
    }

    pub fn with_strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }
}
