//! The ENIP session/CPF core: frame and CPF codecs, the bounded session and
//! delayed-reply tables, device identity replies, the command dispatcher, and the
//! `Endpoint` that ties them to the public boundary API.

pub mod cpf;
pub mod delayed;
pub mod dispatch;
pub mod endpoint;
pub mod frame;
pub mod identity;
pub mod router;
pub mod session;
