//! Pipeline stages, leaf-first: indicators, windowing, rendering,
//! digest composition, and the batch run that strings them together.

pub mod indicator_service;
pub mod window_service;
pub mod chart_service;
pub mod digest_service;
pub mod report_service;
