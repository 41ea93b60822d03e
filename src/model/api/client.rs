use std::convert::Infallible;
use std::net::IpAddr;

use rocket::{
    request::{FromRequest, Outcome},
    Request,
};

/// The caller's network address, as recorded in audit logs.
///
/// Behind a proxy this is the first `X-Forwarded-For` entry; otherwise the
/// address Rocket sees (which honours `X-Real-IP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddress(pub Option<IpAddr>);

impl ClientAddress {
    pub fn of(req: &Request<'_>) -> Self {
        let forwarded = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(first_forwarded_address);
        Self(forwarded.or_else(|| req.client_ip()))
    }

    pub fn to_option_string(self) -> Option<String> {
        self.0.map(|ip| ip.to_string())
    }
}

fn first_forwarded_address(header: &str) -> Option<IpAddr> {
    header.split(',').next()?.trim().parse().ok()
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientAddress {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(Self::of(req))
    }
}
