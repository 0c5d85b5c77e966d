//! Authentication layer.
//!
//! The actual authentication protocol lives upstream (an SSO/identity proxy
//! terminates it); this service trusts a configured header carrying the
//! authenticated user's email. See [`current_user`] for the extractor.

pub mod current_user;
