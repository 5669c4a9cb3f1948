//! Client-side reconnect script.
//!
//! Rendered once per [`LiveReload`](super::LiveReload) and injected into
//! every HTML page. The script implements the protocol modelled by
//! [`ReconnectState`](crate::reconnect::ReconnectState): the reload flag lives
//! in `sessionStorage` so it survives the reload it triggers.

use crate::reconnect::RetryPolicy;

/// `sessionStorage` key of the reload flag.
pub const RELOAD_FLAG_KEY: &str = "simplereloadFlag";

const TEMPLATE: &str = r#"
<script>
	(function() {
		const retryFloor = {{retry_floor}};
		const retryCeiling = {{retry_ceiling}};
		const reloadFlag = {{flag}};
		let retryInterval = retryFloor;

		// A page that just loaded is current; a leftover flag is stale.
		sessionStorage.removeItem(reloadFlag);

		function connect() {
			const source = new EventSource({{route}});
			source.onopen = function() {
				console.log("* simplereload connected *");
				retryInterval = retryFloor;
				if (sessionStorage.getItem(reloadFlag)) {
					sessionStorage.removeItem(reloadFlag);
					console.log("* simplereload: server restarted, reloading *");
					location.reload();
				}
			};
			source.onerror = function() {
				source.close();
				sessionStorage.setItem(reloadFlag, "true");
				const delay = retryInterval;
				retryInterval = Math.min(retryInterval * 2, retryCeiling);
				console.log("* simplereload: connection lost, retrying in " + delay + "ms *");
				setTimeout(connect, delay);
			};
		}

		connect();
	})();
</script>
"#;

/// Render the script markup for the given endpoint route and retry policy.
pub(crate) fn render(route: &str, policy: RetryPolicy) -> String {
    TEMPLATE
        .replace("{{retry_floor}}", &policy.floor.as_millis().to_string())
        .replace("{{retry_ceiling}}", &policy.ceiling.as_millis().to_string())
        .replace("{{flag}}", &js_string(RELOAD_FLAG_KEY))
        .replace("{{route}}", &js_string(route))
}

/// Quote `value` as a JavaScript string literal safe inside a `<script>` block.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace("</", "<\\/")
}
