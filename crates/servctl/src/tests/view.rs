use crate::{Indicator, ToggleState, server_url};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use googletest::assert_that;
use googletest::prelude::eq;

#[test]
fn given_ipv4_address_when_formatting_url_then_plain_host() {
    let url = server_url(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), 8080);

    assert_that!(url.as_str(), eq("http://192.168.1.20:8080"));
}

#[test]
fn given_ipv6_address_when_formatting_url_then_bracketed_host() {
    let url = server_url(IpAddr::V6(Ipv6Addr::LOCALHOST), 8080);

    assert_that!(url.as_str(), eq("http://[::1]:8080"));
}

#[test]
fn given_indicators_when_displayed_then_user_facing_text() {
    let running = Indicator::Url {
        address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        port: 8181,
    };

    assert_that!(
        running.to_string().as_str(),
        eq("Server URL: http://10.0.0.7:8181")
    );
    assert_that!(Indicator::Stopped.to_string().as_str(), eq("Server stopped"));
    assert_that!(
        Indicator::ConnectionError.to_string().as_str(),
        eq("Error connecting to the server service")
    );
    assert!(Indicator::Stopped.url().is_none());
}

#[test]
fn given_toggle_states_when_checked_then_follows_target() {
    assert!(ToggleState::On.is_checked());
    assert!(ToggleState::TransitioningOn.is_checked());
    assert!(!ToggleState::TransitioningOff.is_checked());
    assert!(!ToggleState::Error.is_checked());
    assert!(ToggleState::TransitioningOff.is_transitioning());
    assert!(!ToggleState::Off.is_transitioning());
}
