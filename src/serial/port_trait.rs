//! Trait abstraction for serial port operations to enable testing

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt};

/// Read half of an opened port
pub type PortReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of an opened port
pub type PortWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Buffer-level operations that sit beside the byte stream
pub trait PortControl: Send + Sync {
    /// Bytes waiting in the driver's input buffer
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Drop everything in the driver's input buffer
    fn discard_input(&self) -> io::Result<()>;

    /// Drop everything in the driver's output buffer
    fn discard_output(&self) -> io::Result<()>;
}

/// Parameters for opening a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortOptions {
    pub name: String,
    pub baud_rate: u32,
    pub dtr: bool,
    pub rts: bool,
    /// Driver-level blocking timeout
    pub timeout: Duration,
}

/// An opened port split into its parts
pub struct OpenedPort {
    pub reader: PortReader,
    pub writer: PortWriter,
    pub control: Arc<dyn PortControl>,
}

/// Enumerates and opens ports
pub trait PortDriver: Send + Sync {
    /// Names of the ports present on this machine
    fn available_ports(&self) -> io::Result<Vec<String>>;

    /// Open a port with 8N1 framing and no flow control
    fn open(&self, options: &PortOptions) -> io::Result<OpenedPort>;
}

/// Driver backed by `tokio-serial`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSerialDriver;

impl PortDriver for TokioSerialDriver {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        let ports = tokio_serial::available_ports()?;
        Ok(ports.into_iter().map(|port| port.port_name).collect())
    }

    fn open(&self, options: &PortOptions) -> io::Result<OpenedPort> {
        let mut port = tokio_serial::new(&options.name, options.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(options.timeout)
            .open_native_async()?;

        port.write_data_terminal_ready(options.dtr)?;
        port.write_request_to_send(options.rts)?;

        let control = NativeControl {
            port: Mutex::new(port.try_clone()?),
        };
        let (reader, writer) = tokio::io::split(port);

        Ok(OpenedPort {
            reader: Box::new(reader),
            writer: Box::new(writer),
            control: Arc::new(control),
        })
    }
}

/// Control handle on a cloned native port
struct NativeControl {
    port: Mutex<Box<dyn SerialPort>>,
}

impl NativeControl {
    fn with_port<T>(
        &self,
        f: impl FnOnce(&dyn SerialPort) -> tokio_serial::Result<T>,
    ) -> io::Result<T> {
        let port = self
            .port
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "serial control lock poisoned"))?;
        f(&**port).map_err(io::Error::from)
    }
}

impl PortControl for NativeControl {
    fn bytes_to_read(&self) -> io::Result<u32> {
        self.with_port(|port| port.bytes_to_read())
    }

    fn discard_input(&self) -> io::Result<()> {
        self.with_port(|port| port.clear(ClearBuffer::Input))
    }

    fn discard_output(&self) -> io::Result<()> {
        self.with_port(|port| port.clear(ClearBuffer::Output))
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::io::DuplexStream;

    /// Mock buffer control that counts discards
    #[derive(Default)]
    pub struct MockControl {
        pub pending: AtomicU32,
        pub input_discards: AtomicUsize,
        pub output_discards: AtomicUsize,
    }

    impl MockControl {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn input_discards(&self) -> usize {
            self.input_discards.load(Ordering::SeqCst)
        }

        pub fn output_discards(&self) -> usize {
            self.output_discards.load(Ordering::SeqCst)
        }
    }

    impl PortControl for MockControl {
        fn bytes_to_read(&self) -> io::Result<u32> {
            Ok(self.pending.load(Ordering::SeqCst))
        }

        fn discard_input(&self) -> io::Result<()> {
            self.input_discards.fetch_add(1, Ordering::SeqCst);
            self.pending.store(0, Ordering::SeqCst);
            Ok(())
        }

        fn discard_output(&self) -> io::Result<()> {
            self.output_discards.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Mock driver whose ports are in-memory duplex pipes
    pub struct MockDriver {
        pub ports: Vec<String>,
        pub open_error: Mutex<Option<io::ErrorKind>>,
        /// Pipe capacity in bytes; small values make writes stall
        pub capacity: usize,
        pub opened: Mutex<Vec<PortOptions>>,
        pub devices: Mutex<Vec<DuplexStream>>,
        pub control: Arc<MockControl>,
    }

    impl MockDriver {
        pub fn new(ports: &[&str]) -> Arc<Self> {
            Self::with_capacity(ports, 4096)
        }

        pub fn with_capacity(ports: &[&str], capacity: usize) -> Arc<Self> {
            Arc::new(Self {
                ports: ports.iter().map(|p| p.to_string()).collect(),
                open_error: Mutex::new(None),
                capacity,
                opened: Mutex::new(Vec::new()),
                devices: Mutex::new(Vec::new()),
                control: MockControl::new(),
            })
        }

        pub fn set_open_error(&self, error: io::ErrorKind) {
            *self.open_error.lock().unwrap() = Some(error);
        }

        pub fn open_count(&self) -> usize {
            self.opened.lock().unwrap().len()
        }

        pub fn last_options(&self) -> Option<PortOptions> {
            self.opened.lock().unwrap().last().cloned()
        }

        /// Device end of the most recently opened port
        pub fn take_device(&self) -> DuplexStream {
            self.devices.lock().unwrap().pop().expect("no port opened")
        }
    }

    impl PortDriver for MockDriver {
        fn available_ports(&self) -> io::Result<Vec<String>> {
            Ok(self.ports.clone())
        }

        fn open(&self, options: &PortOptions) -> io::Result<OpenedPort> {
            if let Some(kind) = *self.open_error.lock().unwrap() {
                return Err(io::Error::new(kind, "Mock open error"));
            }

            let (link_side, device_side) = tokio::io::duplex(self.capacity);
            self.opened.lock().unwrap().push(options.clone());
            self.devices.lock().unwrap().push(device_side);

            let (reader, writer) = tokio::io::split(link_side);
            Ok(OpenedPort {
                reader: Box::new(reader),
                writer: Box::new(writer),
                control: self.control.clone(),
            })
        }
    }
}
