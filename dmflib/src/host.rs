//! Host-side transport: a worker thread owning the serial port.
//!
//! The port driver blocks, the protocol core polls; a [SerialLink]
//! bridges the two with a worker thread and a pair of FIFO byte queues.
//! The worker drains the write queue into the port and pushes whatever
//! the port produces into the read queue; the core touches only the
//! queues and never blocks on the driver. All concurrency in the stack
//! lives at this single producer/single consumer boundary.
//!
//! Give the port a short read timeout (tens of milliseconds) before
//! wrapping it: the worker alternates between writing and reading, so
//! the read timeout bounds how long queued writes can wait.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::transport::{Transport, TransportError};

#[derive(Debug, Default)]
struct Shared {
    read_queue: Mutex<VecDeque<u8>>,
    write_queue: Mutex<VecDeque<u8>>,
    open: AtomicBool,
}

/// A [Transport] over any `Read + Write` port, serviced by a worker
/// thread. Built for `serialport` handles but equally happy with a
/// plain file or a socket.
#[derive(Debug)]
pub struct SerialLink {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SerialLink {
    pub fn new<P>(port: P) -> Self
    where
        P: Read + Write + Send + 'static,
    {
        let shared = Arc::new(Shared {
            open: AtomicBool::new(true),
            ..Default::default()
        });
        let worker = std::thread::spawn({
            let shared = shared.clone();
            move || worker(port, shared)
        });
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Close the link and stop the worker. Called implicitly on drop.
    pub fn close(&mut self) {
        self.shared.open.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker<P>(mut port: P, shared: Arc<Shared>)
where
    P: Read + Write,
{
    let mut buf = [0u8; 256];
    while shared.open.load(Ordering::SeqCst) {
        let outgoing: Vec<u8> = shared.write_queue.lock().unwrap().drain(..).collect();
        if !outgoing.is_empty() {
            if port.write_all(&outgoing).and_then(|_| port.flush()).is_err() {
                break;
            }
        }

        match port.read(&mut buf) {
            // EOF: the far side is gone
            Ok(0) => break,
            Ok(n) => shared.read_queue.lock().unwrap().extend(&buf[..n]),
            Err(e) => match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::Interrupted => {}
                _ => break,
            },
        }
    }
    shared.open.store(false, Ordering::SeqCst);
}

impl Transport for SerialLink {
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        self.shared.write_queue.lock().unwrap().push_back(byte);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let byte = self.shared.read_queue.lock().unwrap().pop_front();
        if byte.is_none() && !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        Ok(byte)
    }

    fn available(&self) -> usize {
        self.shared.read_queue.lock().unwrap().len()
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }
}
