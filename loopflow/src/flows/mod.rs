pub mod features;
pub mod flow_features;
