mod fetch;
mod locate;
pub mod xml;

pub use fetch::{ParsedFeed, fetch_and_parse, fetch_feed_bytes, parse_feed};
pub use locate::{FeedSource, locate};
pub use xml::XmlNode;
