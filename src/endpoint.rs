/*
 * Copyright 2020 Joyent, Inc.
 */

use base64;
use sha1::Sha1;

pub type EndpointKey = String;
pub type EndpointPort = u16;
pub type EndpointName = String;
pub type EndpointHost = String;

/// One directory server address. Directory servers are commonly addressed by
/// DNS name rather than IP, so the host is kept as given.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub name: EndpointName,
    pub host: EndpointHost,
    pub port: EndpointPort,
}

impl Endpoint {
    pub fn new(host: &str, port: EndpointPort) -> Self {
        Endpoint {
            name: endpoint_name(host, port),
            host: String::from(host),
            port,
        }
    }
}

fn endpoint_name(host: &str, port: EndpointPort) -> EndpointName {
    [String::from(host), String::from(":"), port.to_string()].concat()
}

/// An opaque, stable key for an endpoint, used for connection bookkeeping and
/// log correlation.
pub fn srv_key(endpoint: &Endpoint) -> EndpointKey {
    let mut sha1 = Sha1::new();
    sha1.update(endpoint.name.as_bytes());
    sha1.update(b"||");
    sha1.update(endpoint.port.to_string().as_bytes());
    sha1.update(b"||");
    sha1.update(endpoint.host.as_bytes());

    base64::encode(&sha1.digest().bytes())
}
