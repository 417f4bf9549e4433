pub mod iat_stats;
pub mod packet_stats;
pub mod util;
