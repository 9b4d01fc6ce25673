//! Transfer progress payload forwarded into `progress` events.

/// Direction of the transfer a [`Progress`] sample describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    /// Request body leaving the client.
    Upload,
    /// Response body arriving from the server.
    Download,
}

/// One progress sample of an in-flight exchange.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// Bytes transferred so far.
    pub loaded: u64,
    /// Total bytes, when the transport knows it (Content-Length).
    pub total: Option<u64>,
    /// Whether this sample measures the upload or the download leg.
    pub direction: TransferDirection,
}

impl Progress {
    /// Completion percentage in `0.0..=100.0`, when the total is known.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.loaded as f64 / total as f64) * 100.0),
            Some(_) => Some(100.0),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_known_total() {
        let p = Progress {
            loaded: 25,
            total: Some(100),
            direction: TransferDirection::Download,
        };
        assert_eq!(p.percentage(), Some(25.0));
    }

    #[test]
    fn test_percentage_unknown_total() {
        let p = Progress {
            loaded: 25,
            total: None,
            direction: TransferDirection::Download,
        };
        assert_eq!(p.percentage(), None);
    }

    #[test]
    fn test_percentage_zero_total() {
        let p = Progress {
            loaded: 0,
            total: Some(0),
            direction: TransferDirection::Upload,
        };
        assert_eq!(p.percentage(), Some(100.0));
    }
}
