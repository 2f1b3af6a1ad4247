pub mod guides;
pub mod taxation;
pub mod valuation;
