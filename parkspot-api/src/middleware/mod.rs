pub mod identity;

pub use identity::{
    merchant_identity_middleware, user_identity_middleware, MerchantContext, UserContext,
};
