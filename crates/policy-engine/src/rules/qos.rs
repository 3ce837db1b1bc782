use std::num::NonZeroU32;
use std::path::Path;

use netlimit_core::config::QOS_POLICY_NAME;

use crate::escape::quoted;
use crate::rules::{SILENT, STOP_ON_ERROR};
use crate::{PolicyScript, ScriptKind};

/// Converts kbps to the bits per second `New-NetQosPolicy` expects.
/// Uses 1 kbps = 1000 bps; anything non-positive becomes 0.
pub fn kbps_to_bits_per_second(kbps: i64) -> u64 {
    if kbps <= 0 {
        return 0;
    }
    (kbps as u64).saturating_mul(1000)
}

pub(crate) fn remove_policy_line() -> String {
    format!(
        "Remove-NetQosPolicy -Name {} -PolicyStore ActiveStore -Confirm:$false {SILENT}",
        quoted(QOS_POLICY_NAME)
    )
}

/// Replaces the tool's QoS policy with one throttling `exe_path` to `kbps`.
pub fn render_rate_limit_script(exe_path: &Path, kbps: NonZeroU32) -> PolicyScript {
    let path = exe_path.to_string_lossy();
    let bits_per_second = kbps_to_bits_per_second(i64::from(kbps.get()));
    let text = format!(
        "{STOP_ON_ERROR}\n\
         {remove}\n\
         \n\
         New-NetQosPolicy -Name {name} -AppPathNameMatchCondition {path} -ThrottleRateActionBitsPerSecond {bits_per_second} -PolicyStore ActiveStore\n",
        remove = remove_policy_line(),
        name = quoted(QOS_POLICY_NAME),
        path = quoted(&path),
    );
    tracing::trace!(
        target: "netlimit.policy",
        path = %path,
        kbps = kbps.get(),
        bits_per_second,
        "rendered rate limit script"
    );
    PolicyScript::new(ScriptKind::RateLimit, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kbps_conversion() {
        assert_eq!(kbps_to_bits_per_second(1), 1000);
        assert_eq!(kbps_to_bits_per_second(200), 200_000);
        assert_eq!(kbps_to_bits_per_second(i64::from(u32::MAX)), u64::from(u32::MAX) * 1000);
    }

    #[test]
    fn test_kbps_conversion_clamps_non_positive() {
        assert_eq!(kbps_to_bits_per_second(0), 0);
        assert_eq!(kbps_to_bits_per_second(-1), 0);
        assert_eq!(kbps_to_bits_per_second(i64::MIN), 0);
    }

    #[test]
    fn test_rate_limit_script() {
        let kbps = NonZeroU32::new(200).unwrap();
        let script = render_rate_limit_script(&PathBuf::from(r"C:\Apps\game.exe"), kbps);
        assert_eq!(script.kind, ScriptKind::RateLimit);

        let text = &script.text;
        let remove = text.find("Remove-NetQosPolicy").unwrap();
        let create = text.find("New-NetQosPolicy").unwrap();
        assert!(remove < create);
        assert!(text.contains(&format!("-Name \"{QOS_POLICY_NAME}\"")));
        assert!(text.contains(r#"-AppPathNameMatchCondition "C:\Apps\game.exe""#));
        assert!(text.contains("-ThrottleRateActionBitsPerSecond 200000 "));
        assert!(text.contains("-PolicyStore ActiveStore"));
    }
}
