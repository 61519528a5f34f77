//! Netgroup membership queries (`innetgr(3)`).
//!
//! Grounded in the original implementation's `netgr_matches()`
//! (`match.c`): that function probes the long (FQDN) hostname first and
//! falls back to the short hostname when they differ; the `XXX - swap
//! order of host & shost` comment there marks this as the one spot the
//! original intended but never made configurable. This crate keeps the
//! long-first, short-second order (see DESIGN.md decision 3).

use std::ffi::CString;

fn to_cstring(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

/// # Safety
/// `innetgr` is safe to call with any combination of null/non-null
/// NUL-terminated C strings; passing a null disables that particular
/// selector (matches any host/user/domain).
unsafe fn innetgr_raw(
    netgroup: &CString,
    host: Option<&CString>,
    user: Option<&CString>,
    domain: Option<&CString>,
) -> bool {
    let host_ptr = host.map_or(std::ptr::null(), |c| c.as_ptr());
    let user_ptr = user.map_or(std::ptr::null(), |c| c.as_ptr());
    let domain_ptr = domain.map_or(std::ptr::null(), |c| c.as_ptr());

    // SAFETY: all pointers are either null or valid NUL-terminated C strings
    // owned by a `CString` that outlives this call.
    unsafe { libc::innetgr(netgroup.as_ptr(), host_ptr, user_ptr, domain_ptr) != 0 }
}

/// Test whether `long_host` (or, failing that, `short_host` when distinct
/// from `long_host`) is a member of netgroup `name`, optionally restricted
/// to `user` and `domain`.
pub fn host_in_netgroup(
    name: &str,
    long_host: &str,
    short_host: &str,
    user: Option<&str>,
    domain: Option<&str>,
) -> bool {
    let Some(netgroup) = to_cstring(name) else {
        return false;
    };
    let user = user.and_then(to_cstring);
    let domain = domain.and_then(to_cstring);

    let Some(long_c) = to_cstring(long_host) else {
        return false;
    };
    // SAFETY: all CStrings are valid for the duration of the call.
    if unsafe { innetgr_raw(&netgroup, Some(&long_c), user.as_ref(), domain.as_ref()) } {
        return true;
    }

    if short_host != long_host {
        if let Some(short_c) = to_cstring(short_host) {
            // SAFETY: as above.
            return unsafe {
                innetgr_raw(&netgroup, Some(&short_c), user.as_ref(), domain.as_ref())
            };
        }
    }

    false
}

/// Test whether `user` (with no host restriction) is a member of netgroup `name`.
pub fn user_in_netgroup(name: &str, user: &str, domain: Option<&str>) -> bool {
    let Some(netgroup) = to_cstring(name) else {
        return false;
    };
    let Some(user_c) = to_cstring(user) else {
        return false;
    };
    let domain = domain.and_then(to_cstring);

    // SAFETY: all CStrings are valid for the duration of the call.
    unsafe { innetgr_raw(&netgroup, None, Some(&user_c), domain.as_ref()) }
}
