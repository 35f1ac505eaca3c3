use crate::constants::*;

// Settings represents the options that can be set when opening a database
// and that the node layer consults while spilling.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Create the database file if it doesn't exist
    pub auto_create: bool,

    // Open database in read-only mode. A shared file lock is taken instead
    // of the exclusive writer lock and every allocation fails.
    pub read_only: bool,

    /// Size of a page in bytes. Fixed when the file is created.
    pub page_size: usize,

    // Percentage that split pages are filled. Values outside
    // [MIN_FILL_PERCENTAGE, MAX_FILL_PERCENTAGE] are clamped.
    pub fill_percent: f64,

    // Offer every leaf to the compressor before it is split and written.
    pub compress: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            auto_create: true,
            read_only: false,
            page_size: OS_PAGE_SIZE,
            fill_percent: DEF_FILL_PERCENTAGE,
            compress: false,
        }
    }
}

impl Settings {
    pub fn with_page_size(mut self, page_size: usize) -> Settings {
        self.page_size = page_size;
        self
    }

    pub fn with_fill_percent(mut self, fill_percent: f64) -> Settings {
        self.fill_percent = fill_percent;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Settings {
        self.compress = compress;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Settings {
        self.read_only = read_only;
        self
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Settings {
        self.auto_create = auto_create;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert!(s.auto_create);
        assert!(!s.read_only);
        assert!(!s.compress);
        assert_eq!(s.page_size, 4096);
        assert_eq!(s.fill_percent, 0.5);
    }

    #[test]
    fn builders_chain() {
        let s = Settings::default().with_page_size(1024).with_fill_percent(0.9).with_compression(true);
        assert_eq!(s.page_size, 1024);
        assert_eq!(s.fill_percent, 0.9);
        assert!(s.compress);
    }
}
