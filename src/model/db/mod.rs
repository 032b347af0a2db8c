//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - natural keys are stored as `_id`;
//! - timestamps are stored as BSON datetimes.

mod ballot;
pub use ballot::{Ballot, BallotResults};

mod candidacy;
pub use candidacy::Candidacy;

mod election;
pub use election::Election;

mod person;
pub use person::{Party, Person};

mod post;
pub use post::Post;
