use foundation::time::Time;

/// Per-frame metadata handed to every animation step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame (0 for the first frame).
    pub dt_s: f64,
    /// Wall-clock time at the start of the frame.
    pub time: Time,
}

/// Turns host timestamps (e.g. `requestAnimationFrame`) into [`Frame`]s.
///
/// The clock never runs backwards: a timestamp earlier than the previous
/// one yields `dt_s == 0` and keeps the previous time.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    last: Option<Frame>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, now_s: f64) -> Frame {
        let frame = match self.last {
            None => Frame {
                index: 0,
                dt_s: 0.0,
                time: Time(now_s),
            },
            Some(prev) => {
                let now = Time(now_s.max(prev.time.0));
                Frame {
                    index: prev.index + 1,
                    dt_s: now.since(prev.time),
                    time: now,
                }
            }
        };
        self.last = Some(frame);
        frame
    }

    pub fn last(&self) -> Option<Frame> {
        self.last
    }
}
