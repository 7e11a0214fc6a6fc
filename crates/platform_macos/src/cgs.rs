//! Private CoreGraphics Services bindings.
//!
//! These symbols are undocumented and may change between macOS releases.
//! Results are returned as untyped [`RawTopology`] so that validation stays
//! in the core crate.

use crate::PlatformError;
use core_foundation::array::CFArray;
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_foundation_sys::array::{CFArrayGetCount, CFArrayGetTypeID, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation_sys::base::CFGetTypeID;
use core_foundation_sys::dictionary::{CFDictionaryGetTypeID, CFDictionaryGetValue, CFDictionaryRef};
use spacenotes_core::{RawDisplay, RawSpace, RawTopology, SpaceId, WindowNumber};

pub(crate) type ConnectionId = i32;

/// Include current, other and user spaces in window lookups.
const ALL_SPACES_MASK: i32 = 0x7;

const KEY_DISPLAY_IDENTIFIER: &str = "Display Identifier";
const KEY_SPACES: &str = "Spaces";
const KEY_ID64: &str = "id64";
const KEY_MANAGED_SPACE_ID: &str = "ManagedSpaceID";
const KEY_TYPE: &str = "type";
const KEY_UUID: &str = "uuid";

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGSMainConnectionID() -> ConnectionId;
    fn CGSGetActiveSpace(cid: ConnectionId) -> u64;
    fn CGSCopyManagedDisplaySpaces(cid: ConnectionId) -> CFArrayRef;
    fn CGSCopySpacesForWindows(cid: ConnectionId, mask: i32, windows: CFArrayRef) -> CFArrayRef;
}

pub(crate) fn main_connection() -> ConnectionId {
    unsafe { CGSMainConnectionID() }
}

pub(crate) fn active_space(cid: ConnectionId) -> Result<SpaceId, PlatformError> {
    let space = unsafe { CGSGetActiveSpace(cid) };
    if space == 0 {
        return Err(PlatformError::QueryFailed(
            "CGSGetActiveSpace returned no space".to_string(),
        ));
    }
    Ok(space as SpaceId)
}

pub(crate) fn managed_display_spaces(cid: ConnectionId) -> Result<RawTopology, PlatformError> {
    let displays = unsafe { CGSCopyManagedDisplaySpaces(cid) };
    if displays.is_null() {
        return Err(PlatformError::QueryFailed(
            "CGSCopyManagedDisplaySpaces returned null".to_string(),
        ));
    }
    let displays = unsafe { CFType::wrap_under_create_rule(displays as CFTypeRef) };
    let entries = array_items(&displays).ok_or_else(|| {
        PlatformError::QueryFailed("managed display spaces is not an array".to_string())
    })?;
    Ok(entries.iter().map(parse_display).collect())
}

pub(crate) fn space_for_window(cid: ConnectionId, window: WindowNumber) -> Option<SpaceId> {
    let windows = CFArray::from_CFTypes(&[CFNumber::from(window)]);
    let spaces = unsafe {
        CGSCopySpacesForWindows(cid, ALL_SPACES_MASK, windows.as_concrete_TypeRef())
    };
    if spaces.is_null() {
        return None;
    }
    let spaces = unsafe { CFType::wrap_under_create_rule(spaces as CFTypeRef) };
    array_items(&spaces)?.first().and_then(number)
}

fn parse_display(entry: &CFType) -> RawDisplay {
    RawDisplay {
        identifier: lookup(entry, KEY_DISPLAY_IDENTIFIER).as_ref().and_then(string),
        spaces: lookup(entry, KEY_SPACES)
            .as_ref()
            .and_then(array_items)
            .map(|spaces| spaces.iter().map(parse_space).collect()),
    }
}

fn parse_space(entry: &CFType) -> RawSpace {
    RawSpace {
        id64: lookup(entry, KEY_ID64).as_ref().and_then(number),
        managed_space_id: lookup(entry, KEY_MANAGED_SPACE_ID).as_ref().and_then(number),
        space_type: lookup(entry, KEY_TYPE).as_ref().and_then(number),
        uuid: lookup(entry, KEY_UUID).as_ref().and_then(string),
    }
}

fn lookup(dictionary: &CFType, key: &str) -> Option<CFType> {
    if unsafe { CFGetTypeID(dictionary.as_CFTypeRef()) != CFDictionaryGetTypeID() } {
        return None;
    }
    let key = CFString::new(key);
    let value = unsafe {
        CFDictionaryGetValue(dictionary.as_CFTypeRef() as CFDictionaryRef, key.as_CFTypeRef())
    };
    if value.is_null() {
        None
    } else {
        Some(unsafe { CFType::wrap_under_get_rule(value) })
    }
}

fn array_items(array: &CFType) -> Option<Vec<CFType>> {
    if unsafe { CFGetTypeID(array.as_CFTypeRef()) != CFArrayGetTypeID() } {
        return None;
    }
    let array = array.as_CFTypeRef() as CFArrayRef;
    let count = unsafe { CFArrayGetCount(array) };
    let items = (0..count)
        .filter_map(|index| {
            let item = unsafe { CFArrayGetValueAtIndex(array, index) };
            if item.is_null() {
                None
            } else {
                Some(unsafe { CFType::wrap_under_get_rule(item) })
            }
        })
        .collect();
    Some(items)
}

fn number(value: &CFType) -> Option<i64> {
    value.downcast::<CFNumber>().and_then(|n| n.to_i64())
}

fn string(value: &CFType) -> Option<String> {
    value.downcast::<CFString>().map(|s| s.to_string())
}
