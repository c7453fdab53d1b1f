/// String type without interior nul bytes.
pub mod non_nul_string;
