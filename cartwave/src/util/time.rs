// Clock-style length strings ("ss", "mm:ss", "hh:mm:ss", optionally with a
// fractional ".d" suffix) appear in the list/tags chunk and the proprietary
// trailer formats. Values are normalized to milliseconds.
pub(crate) fn parse_time_length(text: &str) -> Option<i64> {
	let text = text.trim();
	if text.is_empty() {
		return None;
	}

	let (clock, fraction) = match text.split_once('.') {
		Some((clock, fraction)) => (clock, Some(fraction)),
		None => (text, None),
	};

	let mut msecs = 0_i64;
	for section in clock.split(':') {
		let value = section.trim().parse::<i64>().ok()?;
		msecs = msecs * 60 + value;
	}
	msecs *= 1000;

	if let Some(fraction) = fraction {
		let digits: String = fraction.chars().take_while(char::is_ascii_digit).collect();
		if !digits.is_empty() {
			let scale = 10_i64.pow(3_u32.saturating_sub(digits.len() as u32));
			msecs += digits.parse::<i64>().ok()? * scale;
		}
	}

	Some(msecs)
}
