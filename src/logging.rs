use lazy_static::lazy_static;
pub use slog::*;

use super::config;


fn wrap<D: Drain<Err = Never, Ok = ()> + Send + 'static>(drain: D) -> Fuse<slog_async::Async> {
    slog_async::Async::default(slog_envlogger::new(drain)).fuse()
}

lazy_static! {
    /// `LOG_FORMAT=json` switches to one JSON object per line on stdout;
    /// anything else prints for a terminal. `RUST_LOG` sets the level filter.
    pub static ref DEFAULT: Logger = {
	let drain = match config::get("LOG_FORMAT").as_deref() {
	    Some("json") => wrap(slog_json::Json::default(std::io::stdout()).fuse()),
	    _ => wrap(slog_term::FullFormat::new(slog_term::TermDecorator::new().build()).build().fuse()),
	};
	Logger::root(drain, o!("crate" => env!("CARGO_PKG_NAME"),
			       "version" => env!("CARGO_PKG_VERSION")))
    };
}


/// Child of `DEFAULT` tagged with the pipeline stage that logs through it.
pub fn component(name: &'static str) -> Logger {
    DEFAULT.new(o!("component" => name))
}
