//! Foreground-window identity for the focus monitor.

/// Opaque handle of the currently focused top-level window.
#[cfg(target_os = "windows")]
pub fn foreground_window() -> Option<isize> {
    use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.0.is_null() {
        None
    } else {
        Some(hwnd.0 as isize)
    }
}

#[cfg(not(target_os = "windows"))]
pub fn foreground_window() -> Option<isize> {
    None
}
