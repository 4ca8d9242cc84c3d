//! The byte-transport seam between the protocol core and whatever is
//! actually moving bytes (a UART, a serial port worker, a test pipe).

/// A failed transport operation.
///
/// The core maps every one of these to [ReturnCode::NOT_CONNECTED] at
/// the dispatch boundary; no finer distinction crosses it.
///
/// [ReturnCode::NOT_CONNECTED]: crate::protocol::ReturnCode::NOT_CONNECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The link is closed, or the driver behind it has failed.
    NotConnected,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "transport is not connected"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// A byte-oriented, half-duplex-friendly link.
///
/// Reads never block: `read_byte` returns `Ok(None)` when nothing has
/// arrived yet, and the caller polls. Writes may buffer; delivery order
/// is FIFO. Implementations sit outside the core: an interrupt-fed UART
/// on a device, a worker thread over a serial port on a host.
pub trait Transport {
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError>;

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Number of bytes ready to read without waiting.
    fn available(&self) -> usize;

    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        (**self).write_byte(byte)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }

    fn available(&self) -> usize {
        (**self).available()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// An in-memory serial link: two cross-connected byte queues.
///
/// Lossless and order-preserving, which makes it the reference link for
/// the integration tests and for running two sessions back to back in
/// one process.
#[cfg(feature = "std")]
pub mod pipe {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{Transport, TransportError};

    #[derive(Debug, Default)]
    struct Shared {
        a_to_b: Mutex<VecDeque<u8>>,
        b_to_a: Mutex<VecDeque<u8>>,
        open: AtomicBool,
    }

    /// One end of a [pair].
    #[derive(Debug)]
    pub struct PipeTransport {
        shared: Arc<Shared>,
        is_a: bool,
    }

    /// Create both ends of an in-memory link.
    pub fn pair() -> (PipeTransport, PipeTransport) {
        let shared = Arc::new(Shared {
            open: AtomicBool::new(true),
            ..Default::default()
        });
        (
            PipeTransport {
                shared: shared.clone(),
                is_a: true,
            },
            PipeTransport { shared, is_a: false },
        )
    }

    impl PipeTransport {
        /// Close the link for both ends.
        pub fn close(&self) {
            self.shared.open.store(false, Ordering::SeqCst);
        }

        fn outgoing(&self) -> &Mutex<VecDeque<u8>> {
            if self.is_a {
                &self.shared.a_to_b
            } else {
                &self.shared.b_to_a
            }
        }

        fn incoming(&self) -> &Mutex<VecDeque<u8>> {
            if self.is_a {
                &self.shared.b_to_a
            } else {
                &self.shared.a_to_b
            }
        }
    }

    impl Transport for PipeTransport {
        fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
            if !self.is_open() {
                return Err(TransportError::NotConnected);
            }
            self.outgoing().lock().unwrap().push_back(byte);
            Ok(())
        }

        fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
            if !self.is_open() {
                return Err(TransportError::NotConnected);
            }
            Ok(self.incoming().lock().unwrap().pop_front())
        }

        fn available(&self) -> usize {
            self.incoming().lock().unwrap().len()
        }

        fn is_open(&self) -> bool {
            self.shared.open.load(Ordering::SeqCst)
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn bytes_cross_over() {
            let (mut a, mut b) = pair();
            a.write_byte(0x55).unwrap();
            a.write_byte(0xaa).unwrap();
            assert_eq!(b.available(), 2);
            assert_eq!(b.read_byte().unwrap(), Some(0x55));
            assert_eq!(b.read_byte().unwrap(), Some(0xaa));
            assert_eq!(b.read_byte().unwrap(), None);
            assert_eq!(a.available(), 0);
        }

        #[test]
        fn closed_pipe_errors() {
            let (mut a, b) = pair();
            b.close();
            assert!(!a.is_open());
            assert_eq!(a.write_byte(0), Err(TransportError::NotConnected));
        }
    }
}
