//! Example expressions shown by `create --examples` and after parse errors.

/// A sample schedule expression.
#[derive(Debug, Clone, Copy)]
pub struct Example {
    pub expression: &'static str,
    pub summary: &'static str,
}

pub const EXAMPLES: &[Example] = &[
    Example { expression: "every 15 minutes", summary: "*/15 * * * *" },
    Example { expression: "every 2 hours", summary: "0 */2 * * *" },
    Example { expression: "every 3 days", summary: "0 9 */3 * *" },
    Example { expression: "every monday at 9am", summary: "0 9 * * 1" },
    Example { expression: "5:30pm every friday", summary: "30 17 * * 5" },
    Example { expression: "every weekday at 8:30am", summary: "30 8 * * 1-5" },
    Example { expression: "every weekend", summary: "0 9 * * 0,6" },
    Example { expression: "daily at 18:00", summary: "0 18 * * *" },
    Example { expression: "7am", summary: "0 7 * * *" },
    Example { expression: "in 30 minutes", summary: "once, 30 minutes from now" },
    Example { expression: "at 5pm today", summary: "once, today at 17:00" },
    Example { expression: "next friday at 10am", summary: "once, next Friday at 10:00" },
    Example { expression: "on the 1st of january", summary: "0 9 1 1 * (yearly)" },
    Example { expression: "every tuesday 4x", summary: "0 9 * * 2, deleted after 4 runs" },
    Example { expression: "0 9 * * 1-5", summary: "raw cron, used as-is" },
];
