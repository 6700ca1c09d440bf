/*!
 * Object store access
 *
 * `s3` holds the client and the store abstraction the rest of the crate is
 * written against; `uri` parses command-line locations.
 */

pub mod s3;
pub mod uri;

pub use uri::parse_location;
