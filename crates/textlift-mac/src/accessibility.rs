//! Accessibility tree access through `AXUIElement`.
//!
//! Reads go through the `accessibility` crate wrappers; writes, settability
//! checks, pid lookup and `CFRange` extraction need the raw
//! `accessibility-sys` calls, which is the only unsafe code in the crate.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::fmt;

use accessibility::{AXAttribute, AXUIElement};
use accessibility_sys::{
    kAXErrorSuccess, kAXValueTypeCFRange, AXError, AXUIElementGetPid,
    AXUIElementIsAttributeSettable, AXUIElementSetAttributeValue, AXValueGetValue, AXValueRef,
};
use core_foundation::base::{CFRange, CFType, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::CFString;
use textlift::platform::attr;
use textlift::{AccessibilityApi, Error, Pid, Result, TextRange};
use tracing::trace;

/// Handle to one element in another process's accessibility tree.
///
/// The handle does not keep the element alive; once the owning control goes
/// away every read returns `None`.
#[derive(Clone, PartialEq)]
pub struct MacElement(AXUIElement);

impl MacElement {
    fn raw(&self) -> accessibility_sys::AXUIElementRef {
        self.0.as_concrete_TypeRef()
    }
}

impl fmt::Debug for MacElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacElement({:p})", self.raw())
    }
}

/// [`AccessibilityApi`] backed by the macOS AX API.
pub struct MacAccessibility {
    system: AXUIElement,
}

impl MacAccessibility {
    /// Create an accessor rooted at the system-wide element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: AXUIElement::system_wide(),
        }
    }

    fn copy_attribute(element: &AXUIElement, name: &str) -> Option<CFType> {
        element
            .attribute(&AXAttribute::<CFType>::new(&CFString::new(name)))
            .ok()
    }
}

impl Default for MacAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MacAccessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacAccessibility").finish_non_exhaustive()
    }
}

fn as_element(value: &CFType) -> Option<AXUIElement> {
    if value.type_of() != AXUIElement::type_id() {
        return None;
    }
    // SAFETY: the type id was checked above; get-rule retains the reference.
    Some(unsafe {
        AXUIElement::wrap_under_get_rule(value.as_CFTypeRef() as accessibility_sys::AXUIElementRef)
    })
}

fn check(code: AXError, attribute: &str) -> Result<()> {
    if code == kAXErrorSuccess {
        Ok(())
    } else {
        Err(Error::attribute_write(attribute, format!("AX error {code}")))
    }
}

impl AccessibilityApi for MacAccessibility {
    type Element = MacElement;

    fn system_focused_element(&self) -> Option<MacElement> {
        let value = Self::copy_attribute(&self.system, attr::FOCUSED_UI_ELEMENT)?;
        as_element(&value).map(MacElement)
    }

    fn focused_application(&self) -> Option<MacElement> {
        let value = Self::copy_attribute(&self.system, attr::FOCUSED_APPLICATION)?;
        as_element(&value).map(MacElement)
    }

    fn application(&self, pid: Pid) -> Option<MacElement> {
        Some(MacElement(AXUIElement::application(pid)))
    }

    fn element_attribute(&self, element: &MacElement, attribute: &str) -> Option<MacElement> {
        let value = Self::copy_attribute(&element.0, attribute)?;
        as_element(&value).map(MacElement)
    }

    fn string_attribute(&self, element: &MacElement, attribute: &str) -> Option<String> {
        Self::copy_attribute(&element.0, attribute)?
            .downcast::<CFString>()
            .map(|s| s.to_string())
    }

    fn bool_attribute(&self, element: &MacElement, attribute: &str) -> Option<bool> {
        Self::copy_attribute(&element.0, attribute)?
            .downcast::<CFBoolean>()
            .map(bool::from)
    }

    fn selected_range(&self, element: &MacElement) -> Option<TextRange> {
        let value = Self::copy_attribute(&element.0, attr::SELECTED_TEXT_RANGE)?;
        let mut range = CFRange {
            location: 0,
            length: 0,
        };
        // SAFETY: AXValueGetValue checks the stored type against
        // kAXValueTypeCFRange and writes nothing on mismatch.
        let ok = unsafe {
            AXValueGetValue(
                value.as_CFTypeRef() as AXValueRef,
                kAXValueTypeCFRange,
                std::ptr::addr_of_mut!(range).cast::<c_void>(),
            )
        };
        if ok == 0 {
            return None;
        }
        Some(TextRange::new(
            usize::try_from(range.location).ok()?,
            usize::try_from(range.length).ok()?,
        ))
    }

    fn children(&self, element: &MacElement) -> Vec<MacElement> {
        let Ok(children) = element.0.children() else {
            return Vec::new();
        };
        (0..children.len())
            .filter_map(|i| children.get(i).map(|c| MacElement(c.clone())))
            .collect()
    }

    fn pid(&self, element: &MacElement) -> Option<Pid> {
        let mut pid: Pid = 0;
        // SAFETY: the element reference is live for the duration of the call.
        let code = unsafe { AXUIElementGetPid(element.raw(), &mut pid) };
        (code == kAXErrorSuccess && pid > 0).then_some(pid)
    }

    fn is_settable(&self, element: &MacElement, attribute: &str) -> bool {
        let name = CFString::new(attribute);
        let mut settable = 0u8;
        // SAFETY: both references are live and `settable` is a valid out pointer.
        let code = unsafe {
            AXUIElementIsAttributeSettable(
                element.raw(),
                name.as_concrete_TypeRef(),
                &mut settable,
            )
        };
        code == kAXErrorSuccess && settable != 0
    }

    fn set_string_attribute(&self, element: &MacElement, attribute: &str, value: &str) -> Result<()> {
        let name = CFString::new(attribute);
        let text = CFString::new(value);
        // SAFETY: all three references are live for the duration of the call.
        let code = unsafe {
            AXUIElementSetAttributeValue(
                element.raw(),
                name.as_concrete_TypeRef(),
                text.as_CFTypeRef(),
            )
        };
        trace!(attribute, code, "set string attribute");
        check(code, attribute)
    }

    fn set_bool_attribute(&self, element: &MacElement, attribute: &str, value: bool) -> Result<()> {
        let name = CFString::new(attribute);
        let flag = if value {
            CFBoolean::true_value()
        } else {
            CFBoolean::false_value()
        };
        // SAFETY: all three references are live for the duration of the call.
        let code = unsafe {
            AXUIElementSetAttributeValue(
                element.raw(),
                name.as_concrete_TypeRef(),
                flag.as_CFTypeRef(),
            )
        };
        trace!(attribute, code, "set bool attribute");
        check(code, attribute)
    }
}
