//! Optional-backend negotiation, done once per run.
//!
//! Every collaborator the pipeline can live without is checked here, before
//! the first page is touched. The rest of the run only reads the flags and
//! never re-checks.

use crate::config::ConversionConfig;
use crate::pipeline::ocr::{OcrBackend, TesseractBackend};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// What this run can use.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub has_ocr: bool,
    /// The lattice engine (ruled tables).
    pub has_primary_table_engine: bool,
    /// The stream engine (aligned columns).
    pub has_secondary_table_engine: bool,
    /// The OCR backend to call, present exactly when `has_ocr` is true.
    pub ocr_engine: Option<Arc<dyn OcrBackend>>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("has_ocr", &self.has_ocr)
            .field("has_primary_table_engine", &self.has_primary_table_engine)
            .field("has_secondary_table_engine", &self.has_secondary_table_engine)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Capabilities {
    /// Check the configured (or default `tesseract`) OCR backend and decide
    /// which table engines are enabled. Blocking: may spawn a process.
    pub fn detect(config: &ConversionConfig) -> Self {
        let backend: Arc<dyn OcrBackend> = match &config.ocr_backend {
            Some(backend) => Arc::clone(backend),
            None => Arc::new(TesseractBackend::default()),
        };

        let has_ocr = backend.is_available();
        if has_ocr {
            info!(engine = backend.name(), "OCR backend available");
        } else {
            warn!(
                engine = backend.name(),
                "OCR backend not available; scanned pages will keep only their native text"
            );
        }

        let caps = Self {
            has_ocr,
            has_primary_table_engine: config.extract_tables,
            has_secondary_table_engine: config.extract_tables,
            ocr_engine: has_ocr.then_some(backend),
        };
        info!(?caps, "Capabilities detected");
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::OcrError;

    struct Fixed(bool);

    impl OcrBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn is_available(&self) -> bool {
            self.0
        }
        fn recognize(&self, _png: &[u8], _language: &str) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    #[test]
    fn injected_backend_is_checked() {
        let config = ConversionConfig::builder()
            .ocr_backend(Arc::new(Fixed(true)))
            .build()
            .unwrap();
        let caps = Capabilities::detect(&config);
        assert!(caps.has_ocr);
        assert_eq!(caps.ocr_engine.as_ref().map(|b| b.name()), Some("fixed"));
        assert!(caps.has_primary_table_engine && caps.has_secondary_table_engine);
    }

    #[test]
    fn unavailable_backend_is_dropped() {
        let config = ConversionConfig::builder()
            .ocr_backend(Arc::new(Fixed(false)))
            .extract_tables(false)
            .build()
            .unwrap();
        let caps = Capabilities::detect(&config);
        assert!(!caps.has_ocr);
        assert!(caps.ocr_engine.is_none());
        assert!(!caps.has_primary_table_engine);
        assert!(!caps.has_secondary_table_engine);
    }
}
