pub mod assessment;
pub mod recommendation;
