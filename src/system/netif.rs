//! Local network interface enumeration and CIDR/netmask host matching.
//!
//! Grounded in the teacher's own unsafe-libc idiom (`system/mod.rs`'s
//! `Hostname::resolve`/`User::from_libc`: grow-or-retry buffers, `cerr`
//! for error mapping, `MaybeUninit` where libc hands back structs by
//! pointer). The underlying requirement — match a host member that is an
//! IP network against the machine's own interfaces — is not implemented
//! anywhere in the teacher checkout; this module fills that gap for
//! component C3.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::ffi::cerr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceAddr {
    pub addr: IpAddr,
    pub mask: IpAddr,
}

/// Enumerate this machine's configured interface addresses and their netmasks.
pub fn local_interfaces() -> std::io::Result<Vec<IfaceAddr>> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: `head` is a valid out-pointer for getifaddrs.
    cerr(unsafe { libc::getifaddrs(&mut head) })?;

    let mut result = Vec::new();
    let mut cur = head;
    // SAFETY: `cur` walks the linked list that getifaddrs populated; each
    // node is valid until `freeifaddrs` is called below.
    unsafe {
        while !cur.is_null() {
            let ifa = &*cur;
            if let (Some(addr), Some(mask)) = (
                sockaddr_to_ip(ifa.ifa_addr),
                sockaddr_to_ip(ifa.ifa_netmask),
            ) {
                result.push(IfaceAddr { addr, mask });
            }
            cur = ifa.ifa_next;
        }
        libc::freeifaddrs(head);
    }

    Ok(result)
}

/// # Safety
/// `ptr` must be null or a valid pointer to a `sockaddr` as handed back by
/// `getifaddrs` (i.e. actually an `sockaddr_in`/`sockaddr_in6` for the
/// families this function recognizes).
unsafe fn sockaddr_to_ip(ptr: *const libc::sockaddr) -> Option<IpAddr> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller's invariant.
    let family = unsafe { (*ptr).sa_family as libc::c_int };
    match family {
        libc::AF_INET => {
            // SAFETY: family is AF_INET, so this is actually a sockaddr_in.
            let sin = unsafe { &*(ptr as *const libc::sockaddr_in) };
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            // SAFETY: family is AF_INET6, so this is actually a sockaddr_in6.
            let sin6 = unsafe { &*(ptr as *const libc::sockaddr_in6) };
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}

/// A parsed `addr` or `addr/mask` host-member spec (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub addr: IpAddr,
    /// `None` means "use the candidate interface's own mask", per spec.
    pub mask: Option<IpAddr>,
}

impl NetworkSpec {
    /// True if any of `ifaces` has (address AND mask) == (spec-address AND mask),
    /// using this interface's own mask when the spec carries none.
    pub fn matches(&self, ifaces: &[IfaceAddr]) -> bool {
        ifaces.iter().any(|iface| {
            let mask = self.mask.unwrap_or(iface.mask);
            same_family_and(self.addr, mask) == same_family_and(iface.addr, mask)
        })
    }
}

fn same_family_and(addr: IpAddr, mask: IpAddr) -> Option<IpAddr> {
    match (addr, mask) {
        (IpAddr::V4(a), IpAddr::V4(m)) => {
            Some(IpAddr::V4(Ipv4Addr::from(u32::from(a) & u32::from(m))))
        }
        (IpAddr::V6(a), IpAddr::V6(m)) => {
            Some(IpAddr::V6(Ipv6Addr::from(u128::from(a) & u128::from(m))))
        }
        _ => None,
    }
}

fn prefix_to_mask_v4(prefix: u32) -> Ipv4Addr {
    if prefix == 0 {
        Ipv4Addr::from(0u32)
    } else {
        Ipv4Addr::from(u32::MAX << (32 - prefix.min(32)))
    }
}

fn prefix_to_mask_v6(prefix: u32) -> Ipv6Addr {
    if prefix == 0 {
        Ipv6Addr::from(0u128)
    } else {
        Ipv6Addr::from(u128::MAX << (128 - prefix.min(128)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSpecParseError;

impl fmt::Display for NetworkSpecParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid IP network specification")
    }
}

impl FromStr for NetworkSpec {
    type Err = NetworkSpecParseError;

    fn parse(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, mask_str) = match s.split_once('/') {
            Some((a, m)) => (a, Some(m)),
            None => (s, None),
        };
        let addr: IpAddr = addr_str.parse().map_err(|_| NetworkSpecParseError)?;

        let mask = match mask_str {
            None => None,
            Some(m) => Some(parse_mask(addr, m)?),
        };

        Ok(NetworkSpec { addr, mask })
    }
}

fn parse_mask(addr: IpAddr, m: &str) -> Result<IpAddr, NetworkSpecParseError> {
    // Dotted/colon form first (matches the address family literally),
    // otherwise treat as a CIDR prefix length.
    if let Ok(dotted) = m.parse::<IpAddr>() {
        return Ok(dotted);
    }
    let prefix: u32 = m.parse().map_err(|_| NetworkSpecParseError)?;
    match addr {
        IpAddr::V4(_) => {
            if prefix > 32 {
                return Err(NetworkSpecParseError);
            }
            Ok(IpAddr::V4(prefix_to_mask_v4(prefix)))
        }
        IpAddr::V6(_) => {
            if prefix > 128 {
                return Err(NetworkSpecParseError);
            }
            Ok(IpAddr::V6(prefix_to_mask_v6(prefix)))
        }
    }
}
