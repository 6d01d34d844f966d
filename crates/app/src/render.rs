//! Terminal rendering of the wheel

use std::io::Write;

use bitevibes_core::selection;
use bitevibes_core::{Item, SpinEvent, SpinSnapshot, SpinStatus};

/// Name of the item currently under the pointer
pub fn pointer_label(angle: f64, items: &[Item]) -> Option<&str> {
    selection::select(angle, items.len())
        .and_then(|index| items.get(index))
        .map(|item| item.name.as_str())
}

/// Redraw the single status line for one frame
pub fn frame(snapshot: SpinSnapshot, items: &[Item]) {
    let label = pointer_label(snapshot.angle, items).unwrap_or("-");
    let marker = match snapshot.status {
        SpinStatus::Spinning => "~",
        SpinStatus::Settled { .. } => ">",
        SpinStatus::Idle => " ",
    };
    let mut out = std::io::stdout();
    let _ = write!(out, "\r\x1b[2K {} {:>6.1}°  {}", marker, snapshot.angle, label);
    let _ = out.flush();
}

/// Finish the status line
pub fn end_line() {
    println!();
}

/// Terminal stand-ins for sound and haptics
pub fn event(event: &SpinEvent) {
    match event {
        SpinEvent::Click => {
            let mut out = std::io::stdout();
            let _ = write!(out, "\x07");
            let _ = out.flush();
        }
        SpinEvent::Fanfare => println!("\n  ♪ ta-da ♪"),
        SpinEvent::Celebrate => println!("  *** 🎉 ***"),
        SpinEvent::Haptic(_) | SpinEvent::Result(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_label() {
        let items = vec![Item::with_id("a", "Ramen"), Item::with_id("b", "Soba")];
        assert_eq!(pointer_label(0.0, &[]), None);
        let label = pointer_label(10.0, &items).unwrap();
        assert!(label == "Ramen" || label == "Soba");
    }
}
