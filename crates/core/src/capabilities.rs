use crate::error::FileProcessingError;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Html,
    Docx,
    Pdf,
    Sniff,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Sniff => "magic-byte sniffing",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub html: bool,
    pub docx: bool,
    pub pdf: bool,
    pub sniff: bool,
}

static DETECTED: Lazy<Capabilities> = Lazy::new(|| {
    let capabilities = Capabilities {
        html: cfg!(feature = "html"),
        docx: cfg!(feature = "docx"),
        pdf: cfg!(feature = "pdf"),
        sniff: cfg!(feature = "sniff"),
    };

    info!(
        html = capabilities.html,
        docx = capabilities.docx,
        pdf = capabilities.pdf,
        sniff = capabilities.sniff,
        "document capabilities probed"
    );
    for missing in capabilities.missing() {
        warn!(capability = %missing, "optional document capability unavailable");
    }

    capabilities
});

impl Capabilities {
    pub fn detect() -> Self {
        *DETECTED
    }

    pub fn none() -> Self {
        Self {
            html: false,
            docx: false,
            pdf: false,
            sniff: false,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Html => self.html,
            Capability::Docx => self.docx,
            Capability::Pdf => self.pdf,
            Capability::Sniff => self.sniff,
        }
    }

    pub fn require(&self, capability: Capability) -> Result<(), FileProcessingError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(FileProcessingError::dependency_missing(capability.as_str()))
        }
    }

    pub fn missing(&self) -> Vec<Capability> {
        [
            Capability::Html,
            Capability::Docx,
            Capability::Pdf,
            Capability::Sniff,
        ]
        .into_iter()
        .filter(|capability| !self.has(*capability))
        .collect()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingCode;

    #[test]
    fn detection_is_cached_and_stable() {
        let first = Capabilities::detect();
        let handles = (0..4)
            .map(|_| std::thread::spawn(Capabilities::detect))
            .collect::<Vec<_>>();

        for handle in handles {
            let probed = handle.join().expect("probe thread should not panic");
            assert_eq!(probed, first);
        }
    }

    #[test]
    fn default_build_carries_every_capability() {
        let capabilities = Capabilities::detect();
        assert_eq!(capabilities.html, cfg!(feature = "html"));
        assert_eq!(capabilities.pdf, cfg!(feature = "pdf"));
    }

    #[test]
    fn missing_capability_is_an_explicit_error() {
        let error = Capabilities::none()
            .require(Capability::Docx)
            .expect_err("docx should be missing");
        assert_eq!(error.code, ProcessingCode::DependencyMissing);
        assert_eq!(Capabilities::none().missing().len(), 4);
    }
}
