//! Five-field cron expressions evaluated in UTC
//!
//! `minute hour day-of-month month day-of-week`, each field a comma list of
//! `*`, `n`, `a-b`, `*/s`, `a-b/s` or `n/s`. Month and weekday names are
//! accepted (`jan`, `mon`, ...); weekday 7 is Sunday. When both day fields
//! are restricted a day matches if either one matches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::errors::{Result, SeoHubError};

/// `next_after` 的搜索上限
const MAX_LOOKAHEAD_DAYS: i64 = 366 * 5;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// 位集合，bit n 表示值 n
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1u64 << value) != 0
    }

    fn insert(&mut self, value: u32) {
        self.0 |= 1u64 << value;
    }
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: Option<&'static [&'static str]>,
    /// 名称表中下标 0 对应的数值
    name_offset: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: None,
    name_offset: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: None,
    name_offset: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: None,
    name_offset: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: Some(MONTH_NAMES),
    name_offset: 1,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: Some(WEEKDAY_NAMES),
    name_offset: 0,
};

impl FieldSpec {
    fn value(&self, raw: &str) -> Result<u32> {
        if let Some(names) = self.names {
            let lower = raw.to_ascii_lowercase();
            if let Some(idx) = names.iter().position(|n| *n == lower) {
                return Ok(idx as u32 + self.name_offset);
            }
        }
        let value: u32 = raw.parse().map_err(|_| {
            SeoHubError::invalid_cron(format!("invalid {} value '{}'", self.name, raw))
        })?;
        if value < self.min || value > self.max {
            return Err(SeoHubError::invalid_cron(format!(
                "{} value {} out of range {}-{}",
                self.name, value, self.min, self.max
            )));
        }
        Ok(value)
    }

    /// 解析一个字段；返回集合以及该字段是否以 `*` 开头
    fn parse(&self, field: &str) -> Result<(FieldSet, bool)> {
        if field.is_empty() {
            return Err(SeoHubError::invalid_cron(format!("empty {} field", self.name)));
        }

        let mut set = FieldSet(0);
        for part in field.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step.parse().map_err(|_| {
                        SeoHubError::invalid_cron(format!("invalid {} step '{}'", self.name, step))
                    })?;
                    if step == 0 {
                        return Err(SeoHubError::invalid_cron(format!(
                            "{} step must be positive",
                            self.name
                        )));
                    }
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (self.min, self.max)
            } else if let Some((a, b)) = range.split_once('-') {
                let (a, b) = (self.value(a)?, self.value(b)?);
                if a > b {
                    return Err(SeoHubError::invalid_cron(format!(
                        "{} range {}-{} is reversed",
                        self.name, a, b
                    )));
                }
                (a, b)
            } else {
                let v = self.value(range)?;
                // `n/s` 表示从 n 到最大值
                if step.is_some() { (v, self.max) } else { (v, v) }
            };

            let step = step.unwrap_or(1) as usize;
            for v in (start..=end).step_by(step) {
                set.insert(v);
            }
        }

        Ok((set, field.starts_with('*')))
    }
}

fn expand_macro(expr: &str) -> Option<&'static str> {
    match expr.to_ascii_lowercase().as_str() {
        "@hourly" => Some("0 * * * *"),
        "@daily" | "@midnight" => Some("0 0 * * *"),
        "@weekly" => Some("0 0 * * 0"),
        "@monthly" => Some("0 0 1 * *"),
        "@yearly" | "@annually" => Some("0 0 1 1 *"),
        _ => None,
    }
}

/// 已解析的 cron 表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    source: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let source = expression.trim();
        let body = if source.starts_with('@') {
            expand_macro(source).ok_or_else(|| {
                SeoHubError::invalid_cron(format!("unknown cron macro '{}'", source))
            })?
        } else {
            source
        };

        let fields: Vec<&str> = body.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SeoHubError::invalid_cron(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }

        let (minutes, _) = MINUTE.parse(fields[0])?;
        let (hours, _) = HOUR.parse(fields[1])?;
        let (days_of_month, dom_star) = DAY_OF_MONTH.parse(fields[2])?;
        let (months, _) = MONTH.parse(fields[3])?;
        let (mut days_of_week, dow_star) = DAY_OF_WEEK.parse(fields[4])?;
        // 7 也是周日
        if days_of_week.contains(7) {
            days_of_week.insert(0);
        }

        Ok(Self {
            source: source.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !dom_star,
            dow_restricted: !dow_star,
        })
    }

    /// 原始表达式
    pub fn expression(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// 严格晚于 `after` 的第一个匹配分钟（秒被截断）
    ///
    /// 5 年内没有匹配时返回 None，例如 `0 0 30 2 *`。
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let limit = after + Duration::days(MAX_LOOKAHEAD_DAYS);
        let base = after.with_second(0)?.with_nanosecond(0)?;
        let mut current = base + Duration::minutes(1);

        while current <= limit {
            if !self.months.contains(current.month()) {
                let (year, month) = if current.month() == 12 {
                    (current.year() + 1, 1)
                } else {
                    (current.year(), current.month() + 1)
                };
                current = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
                continue;
            }

            if !self.day_matches(current.date_naive()) {
                let next_day = current.date_naive().succ_opt()?;
                current = Utc.from_utc_datetime(&next_day.and_hms_opt(0, 0, 0)?);
                continue;
            }

            if !self.hours.contains(current.hour()) {
                current = current.with_minute(0)? + Duration::hours(1);
                continue;
            }

            if !self.minutes.contains(current.minute()) {
                current += Duration::minutes(1);
                continue;
            }

            return Some(current);
        }

        None
    }

    /// 从 `after` 开始的若干次触发时间
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = after;
        while out.len() < count {
            match self.next_after(cursor) {
                Some(next) => {
                    out.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        out
    }
}

impl FromStr for CronSchedule {
    type Err = SeoHubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 解析并确认表达式至少会触发一次
pub fn validate_expression(expression: &str, now: DateTime<Utc>) -> Result<CronSchedule> {
    let schedule = CronSchedule::parse(expression)?;
    if schedule.next_after(now).is_none() {
        return Err(SeoHubError::invalid_cron(format!(
            "'{}' never fires",
            expression.trim()
        )));
    }
    Ok(schedule)
}
