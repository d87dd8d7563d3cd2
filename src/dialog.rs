//! Reporting of errors that stop the program before its first frame.

use log::error;

use crate::error::Error;

/// Text shown to the user for a fatal startup error.
pub fn fatal_message(e: &Error) -> String {
    format!("{e}\n\nThe program will now exit.")
}

/// Logs `e` and shows it in a modal dialog titled `title`. Returns once the
/// dialog is dismissed.
pub fn report_fatal(title: &str, e: &Error) {
    error!("{e}");
    show(title, &fatal_message(e));
}

#[cfg(windows)]
fn show(title: &str, text: &str) {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

    let text = wide(text);
    let title = wide(title);
    // SAFETY: both buffers are nul-terminated and outlive the call.
    unsafe {
        MessageBoxW(
            HWND(0),
            PCWSTR::from_raw(text.as_ptr()),
            PCWSTR::from_raw(title.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

#[cfg(windows)]
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

// No native dialog off Windows; the terminal is the user-visible channel.
#[cfg(not(windows))]
fn show(title: &str, text: &str) {
    eprintln!("{title}: {text}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphicsStep;
    use crate::graphics::FeatureLevel;

    #[test]
    fn fatal_message_names_the_failing_step() {
        let steps = [
            (GraphicsStep::Surface, "create surface failed"),
            (GraphicsStep::Device, "request device failed"),
            (GraphicsStep::DepthTarget, "create depth/stencil target failed"),
        ];
        for (step, expected) in steps {
            let text = fatal_message(&Error::graphics(step, "device removed"));
            assert!(text.starts_with(expected), "{text}");
            assert!(text.contains("device removed"));
        }

        let text = fatal_message(&Error::WindowCreation("no display".to_string()));
        assert!(text.starts_with("window creation failed: no display"));

        let text = fatal_message(&Error::UnsupportedHardware {
            found: FeatureLevel::Sm2,
            required: FeatureLevel::Sm5,
        });
        assert!(text.contains("9.3"));
        assert!(text.contains("11.0"));
    }
}
