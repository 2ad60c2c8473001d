// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Browser page that asks the wallet extension to sign the challenge.

use super::AuthChallenge;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>memvault sign-in</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 36rem; margin: 4rem auto; color: #222; }
button { font-size: 1rem; padding: 0.6rem 1.2rem; cursor: pointer; }
#status { margin-top: 1.5rem; }
.error { color: #b00020; }
</style>
</head>
<body>
<h1>Unlock with your wallet</h1>
<p>Sign the message below to prove you control your wallet. No transaction is sent.</p>
<pre id="message"></pre>
<button id="sign">Connect and sign</button>
<p id="status"></p>
<script>
const MESSAGE = __MESSAGE__;
const NONCE = __NONCE__;
const status = document.getElementById("status");
document.getElementById("message").textContent = MESSAGE;

function report(text, failed) {
  status.textContent = text;
  status.className = failed ? "error" : "";
}

document.getElementById("sign").addEventListener("click", async () => {
  if (!window.ethereum) {
    report("No wallet extension found in this browser.", true);
    return;
  }
  try {
    const [address] = await window.ethereum.request({ method: "eth_requestAccounts" });
    const signature = await window.ethereum.request({
      method: "personal_sign",
      params: [MESSAGE, address],
    });
    const response = await fetch("/callback", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ address, signature, nonce: NONCE }),
    });
    const result = await response.json();
    if (result.success) {
      report("Signed in. You can close this tab.", false);
    } else {
      report("Sign-in rejected: " + result.error, true);
    }
  } catch (err) {
    report("Signing failed: " + (err.message || err), true);
  }
});
</script>
</body>
</html>
"#;

/// Render the signer page for `challenge`.
pub fn render_signer_page(challenge: &AuthChallenge) -> String {
    PAGE_TEMPLATE
        .replace("__MESSAGE__", &script_literal(&challenge.message()))
        .replace("__NONCE__", &script_literal(&challenge.nonce))
}

/// JSON string literal that is safe inside a `<script>` element.
fn script_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace("</", "<\\/")
}
