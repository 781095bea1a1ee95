//! Wire tag catalogue (§6). Every tag has a fixed total datagram length,
//! except `RPTC` — see the decoding note on [`crate::message::Rptc`].

pub const DMRD: &[u8] = b"DMRD";
pub const RPTL: &[u8] = b"RPTL";
pub const RPTK: &[u8] = b"RPTK";
pub const RPTC: &[u8] = b"RPTC";
pub const RPTPING: &[u8] = b"RPTPING";
pub const RPTCL: &[u8] = b"RPTCL";
pub const RPTACK: &[u8] = b"RPTACK";
pub const MSTNAK: &[u8] = b"MSTNAK";
pub const MSTPONG: &[u8] = b"MSTPONG";
pub const MSTCL: &[u8] = b"MSTCL";

pub const DMRD_LEN: usize = 53;
pub const RPTL_LEN: usize = 8;
pub const RPTK_LEN: usize = 40;
pub const RPTC_MIN_LEN: usize = 302;
pub const RPTPING_LEN: usize = 11;
pub const RPTCL_LEN: usize = 13;
pub const RPTACK_LEN: usize = 10;
pub const MSTNAK_LEN: usize = 10;
pub const MSTPONG_LEN: usize = 11;
pub const MSTCL_LEN: usize = 13;
