//! Voucher store: single-use, multi-use and targeted value vouchers.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{VoucherError, VoucherResult};
pub use manager::VoucherManager;
pub use models::{
    NewVoucher, RedeemContext, Redemption, Voucher, VoucherId, VoucherKind, VoucherSetting,
    VoucherStatus,
};
