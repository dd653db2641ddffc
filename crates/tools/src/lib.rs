//! Path and text helpers shared by the JSP translator and its test support.

pub mod text;
pub mod uri;
