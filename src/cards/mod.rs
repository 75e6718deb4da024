//! Credit card corpus: the records every recommendation is drawn from.

mod corpus;
mod types;

pub use corpus::CardCorpus;
pub use types::{AttributeValue, CardAttributes, CreditCard};
