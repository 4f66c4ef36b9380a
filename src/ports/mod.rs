mod dns;
mod tcp;
mod tls;
mod http;
mod clock;
mod renderer;
mod io;

pub use dns::DnsResolver;
pub use tcp::TcpDialer;
pub use tls::{TlsHandshaker, TlsSession};
pub use http::{HttpClient, HttpExchange, OutboundRequest};
pub use clock::Clock;
pub use renderer::Renderer;
pub use io::{IoStream, BoxedIoStream};
