//! Prometheus text exposition rendering.
//!
//! Pure rendering of a store snapshot into exposition format 0.0.4. Each
//! cached sample produces a `modbus_value` gauge and a companion
//! `modbus_sample_age_seconds` gauge so staleness is visible to alerting.

use std::io::Write;

use chrono::{DateTime, Utc};

use crate::store::Sample;

/// Content type for the metrics endpoint.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a snapshot into the exposition format.
///
/// `now` is taken as a parameter so age computation is deterministic in
/// tests. Output is sorted by (device, slave, register) for stable scrapes.
pub fn render(samples: &[Sample], now: DateTime<Utc>) -> String {
    let mut samples: Vec<&Sample> = samples.iter().collect();
    samples.sort_by(|a, b| {
        (&a.device, a.slave_id, a.register).cmp(&(&b.device, b.slave_id, b.register))
    });

    let mut output = Vec::with_capacity(samples.len() * 160 + 128);

    if !samples.is_empty() {
        writeln!(output, "# TYPE modbus_value gauge").ok();
        for sm in &samples {
            writeln!(
                output,
                "modbus_value{{device=\"{}\",slave=\"{}\",register=\"{}\",name=\"{}\",unit=\"{}\",ip_address=\"{}\"}} {}",
                escape_label_value(&sm.device),
                sm.slave_id,
                sm.register,
                escape_label_value(&sm.name),
                escape_label_value(&sm.unit),
                escape_label_value(&sm.ip_address),
                format_value(sm.value)
            )
            .ok();
        }

        writeln!(output, "# TYPE modbus_sample_age_seconds gauge").ok();
        for sm in &samples {
            let age = (now - sm.timestamp).num_milliseconds() as f64 / 1000.0;
            writeln!(
                output,
                "modbus_sample_age_seconds{{device=\"{}\",slave=\"{}\",register=\"{}\",ip_address=\"{}\"}} {}",
                escape_label_value(&sm.device),
                sm.slave_id,
                sm.register,
                escape_label_value(&sm.ip_address),
                format_value(age)
            )
            .ok();
        }
    }

    writeln!(output, "# TYPE modbus_exporter_samples gauge").ok();
    writeln!(output, "modbus_exporter_samples {}", samples.len()).ok();

    String::from_utf8(output).unwrap_or_default()
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn make_sample(
        device: &str,
        slave_id: u8,
        register: u16,
        name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Sample {
        Sample {
            value,
            timestamp,
            device: device.to_string(),
            slave_id,
            register,
            name: name.to_string(),
            unit: "V".to_string(),
            ip_address: "10.0.0.5".to_string(),
        }
    }

    #[test]
    fn test_render_value_line() {
        let now = Utc::now();
        let sample = make_sample("plant", 1, 100, "voltage", 400.0, now);

        let output = render(&[sample], now);

        assert!(output.contains("# TYPE modbus_value gauge"));
        assert!(output.contains(
            "modbus_value{device=\"plant\",slave=\"1\",register=\"100\",\
             name=\"voltage\",unit=\"V\",ip_address=\"10.0.0.5\"} 400"
        ));
    }

    #[test]
    fn test_render_age_line() {
        let now = Utc::now();
        let captured = now - TimeDelta::milliseconds(1500);
        let sample = make_sample("plant", 1, 100, "voltage", 400.0, captured);

        let output = render(&[sample], now);

        assert!(output.contains("# TYPE modbus_sample_age_seconds gauge"));
        assert!(output.contains(
            "modbus_sample_age_seconds{device=\"plant\",slave=\"1\",\
             register=\"100\",ip_address=\"10.0.0.5\"} 1.5"
        ));
    }

    #[test]
    fn test_render_series_count() {
        let now = Utc::now();
        let samples = vec![
            make_sample("plant", 1, 100, "voltage", 1.0, now),
            make_sample("plant", 1, 101, "current", 2.0, now),
        ];

        let output = render(&samples, now);
        assert!(output.contains("modbus_exporter_samples 2"));

        let empty = render(&[], now);
        assert!(empty.contains("modbus_exporter_samples 0"));
        assert!(!empty.contains("modbus_value{"));
    }

    #[test]
    fn test_render_sorted_by_identity() {
        let now = Utc::now();
        let samples = vec![
            make_sample("b", 1, 100, "x", 1.0, now),
            make_sample("a", 2, 100, "y", 2.0, now),
            make_sample("a", 1, 200, "z", 3.0, now),
            make_sample("a", 1, 100, "w", 4.0, now),
        ];

        let output = render(&samples, now);
        let a1_100 = output.find("device=\"a\",slave=\"1\",register=\"100\"").unwrap();
        let a1_200 = output.find("device=\"a\",slave=\"1\",register=\"200\"").unwrap();
        let a2_100 = output.find("device=\"a\",slave=\"2\",register=\"100\"").unwrap();
        let b1_100 = output.find("device=\"b\",slave=\"1\",register=\"100\"").unwrap();

        assert!(a1_100 < a1_200);
        assert!(a1_200 < a2_100);
        assert!(a2_100 < b1_100);
    }

    #[test]
    fn test_label_escaping() {
        let now = Utc::now();
        let mut sample = make_sample("pl\"ant", 1, 100, "volt\\age", 1.0, now);
        sample.unit = "V\nrms".to_string();

        let output = render(&[sample], now);
        assert!(output.contains("device=\"pl\\\"ant\""));
        assert!(output.contains("name=\"volt\\\\age\""));
        assert!(output.contains("unit=\"V\\nrms\""));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(3.14), "3.14");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
