mod icp_params;
pub use icp_params::IcpParams;
mod correspondence;
pub use correspondence::{Correspondence, CorrespondenceFinder, Match};
mod linear_system;
pub use linear_system::LinearSystem;
pub mod reduction;
mod depth_icp;
pub use depth_icp::{DepthIcp, IcpDiagnostics, IcpResult, IcpStatus};
