// re-exporting functions
mod top;     // impl State { output_top }
mod trace;   // impl Trace { output_report }
mod dot;     pub use dot::DotConf;
mod report;  pub use report::ReportConf;
mod escaper; pub use escaper::*;
