mod duckduckgo;
mod tavily;

pub use duckduckgo::DuckDuckGoProvider;
pub use tavily::TavilyProvider;
