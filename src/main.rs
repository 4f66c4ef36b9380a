use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;
use streamprobe::application::{parse_duration, Config, ProbeRunner};
use streamprobe::domain::{ApiKey, ChatMessage, ChatRequest, ErrorClass, ProbeError, ProbeReport, ProbeRequest};
use streamprobe::infrastructure::{HickoryDnsResolver, HybridHttpClient, JsonRenderer, PrettyRenderer, RustlsTlsHandshaker, TokioClock, TokioTcpDialer};
use streamprobe::ports::Renderer;

#[derive(Parser)]
#[command(name = "sprobe", version, about = "Probe a streaming chat-completion endpoint: phase timings, chunk timeline and the reconstructed message")]
struct Cli {
    /// Endpoint URL(s), e.g. https://api.example.com/v1/chat/completions
    #[arg(required = true)]
    urls: Vec<String>,

    /// Model name sent in the request body
    #[arg(long, short, env = "SPROBE_MODEL")]
    model: String,

    /// User message
    #[arg(long, default_value = "Say hello in one short sentence.")]
    message: String,

    /// Optional system prompt
    #[arg(long)]
    system: Option<String>,

    /// Ask the upstream to stream reasoning tokens
    #[arg(long)]
    reasoning: bool,

    /// Bearer token for the Authorization header
    #[arg(long, env = "SPROBE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Deadline for the whole run (e.g. 30s, 1500ms)
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Bound for TCP connect and TLS handshake
    #[arg(long, value_parser = parse_duration)]
    connect_timeout: Option<Duration>,

    /// Largest frame accepted before a line terminator
    #[arg(long)]
    max_frame_bytes: Option<usize>,

    /// Print the report as JSON
    #[arg(long, short)]
    json: bool,

    /// Log phases and frames to stderr
    #[arg(long, short)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env().with_json(self.json);
        if let Some(t) = self.timeout {
            config = config.with_timeout(t);
        }
        if let Some(t) = self.connect_timeout {
            config = config.with_connect_timeout(t);
        }
        if let Some(max) = self.max_frame_bytes {
            config = config.with_max_frame_bytes(max);
        }
        config
    }

    fn request(&self, url: &str) -> ProbeRequest {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.message.clone()));

        let mut body = ChatRequest::new(self.model.clone(), messages);
        if self.reasoning {
            body = body.with_reasoning(true);
        }
        let request = ProbeRequest::new(url, body);
        match &self.api_key {
            Some(key) => request.with_api_key(ApiKey::new(key.clone())),
            None => request,
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "streamprobe=debug,sprobe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    rustls::crypto::ring::default_provider().install_default().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", ProbeError::other(format!("failed to create runtime: {}", e)));
            return ExitCode::from(ErrorClass::Other.exit_code() as u8);
        }
    };

    rt.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> ExitCode {
    let dns = match HickoryDnsResolver::new() {
        Ok(d) => d,
        Err(e) => { eprintln!("{}", e); return ExitCode::from(e.class.exit_code() as u8); }
    };

    let tls = match RustlsTlsHandshaker::new() {
        Ok(t) => t,
        Err(e) => { eprintln!("{}", e); return ExitCode::from(e.class.exit_code() as u8); }
    };

    let config = cli.config();
    let renderer: Box<dyn Renderer> = if config.json_output { Box::new(JsonRenderer::new()) } else { Box::new(PrettyRenderer::new()) };
    let runner = Arc::new(ProbeRunner::new(dns, TokioTcpDialer::new(), tls, HybridHttpClient::new(), TokioClock::new(), config));

    let mut probes = JoinSet::new();
    for (index, url) in cli.urls.iter().enumerate() {
        let runner = Arc::clone(&runner);
        let request = cli.request(url);
        probes.spawn(async move { (index, runner.run(&request).await) });
    }

    let mut results: Vec<Option<Result<ProbeReport, (ProbeError, ProbeReport)>>> = (0..cli.urls.len()).map(|_| None).collect();
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((index, outcome)) => results[index] = Some(outcome.map_err(|f| (f.error, *f.partial))),
            Err(e) => tracing::error!(error = %e, "probe task failed"),
        }
    }

    let mut exit = ExitCode::SUCCESS;
    let mut failed = false;
    for (url, result) in cli.urls.iter().zip(results) {
        match result {
            Some(Ok(report)) => print!("{}", renderer.render(&report)),
            Some(Err((error, partial))) => {
                print!("{}", renderer.render(&partial));
                eprintln!("{}", error);
                if !failed {
                    exit = ExitCode::from(error.class.exit_code() as u8);
                    failed = true;
                }
            }
            None => {
                eprintln!("{}", ProbeError::other(format!("probe of {} did not complete", url)));
                if !failed {
                    exit = ExitCode::from(ErrorClass::Other.exit_code() as u8);
                    failed = true;
                }
            }
        }
    }
    exit
}
