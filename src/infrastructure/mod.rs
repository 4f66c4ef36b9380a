mod body;
mod dns;
mod tcp;
mod tls;
mod http;
mod clock;
mod renderer;

pub use body::{BodyDecoder, BodyFraming};
pub use dns::HickoryDnsResolver;
pub use tcp::TokioTcpDialer;
pub use tls::RustlsTlsHandshaker;
pub use http::{HybridExchange, HybridHttpClient};
pub use clock::TokioClock;
pub use renderer::{PrettyRenderer, JsonRenderer};
