// Directive classifier integration tests
//
// Covers the documented reply scenarios plus the prefix and idempotence
// properties over a handful of realistic replies.

use aula::directive::{classify, ContentClassification, Directive, DirectiveKind};

const PROTOCOL_REPLY: &str = "Aquí tienes el protocolo:\n```json\n{\"protocol_name\":\"Bullying\",\"steps\":[{\"id\":1,\"title\":\"Contener\",\"description\":\"Separar a los involucrados\"}]}\n```\nAvísame si procedes.";

const EMAIL_REPLY: &str = "Preparé este correo para la familia:\n\n```json\n{\"to\":\"apoderado@familia.cl\",\"subject\":\"Citación\",\"body\":\"Estimada familia,\\nLos citamos el lunes.\",\"cc\":[\"inspectoria@colegio.cl\"]}\n```\n\n¿Quieres que lo envíe?";

const CALENDAR_REPLY: &str = "```json\n{\"prepare_calendar_event\":{\"summary\":\"Reunión de convivencia\",\"start_time\":\"2024-05-02T10:00:00-04:00\",\"end_time\":\"2024-05-02T11:00:00-04:00\",\"attendees\":[\"orientadora@colegio.cl\"]}}\n```";

#[test]
fn test_protocol_scenario() {
    let ContentClassification::CompleteDirective {
        directive,
        text_before,
        text_after,
    } = classify(PROTOCOL_REPLY)
    else {
        panic!("expected a complete directive");
    };
    assert_eq!(text_before, "Aquí tienes el protocolo:");
    assert_eq!(text_after, "Avísame si procedes.");

    let Directive::Protocol(protocol) = directive else {
        panic!("expected a protocol");
    };
    assert_eq!(protocol.protocol_name, "Bullying");
    assert_eq!(protocol.steps.len(), 1);
    assert_eq!(protocol.steps[0].id, 1);
    assert_eq!(protocol.steps[0].description, "Separar a los involucrados");
}

#[test]
fn test_unclosed_email_scenario_is_streaming() {
    let result = classify("```json\n{\"to\":\"a@x.com\",\"subject\":\"S");
    assert_eq!(
        result,
        ContentClassification::StreamingDirective {
            text_before: String::new()
        }
    );
}

#[test]
fn test_malformed_interior_scenario() {
    match classify("```json\n{not valid json}\n```") {
        ContentClassification::ParseError { raw, message, .. } => {
            assert_eq!(raw, "{not valid json}");
            assert!(!message.is_empty());
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_persisted_email_success_receipt() {
    let text = "{\"type\":\"email_success\",\"to\":\"a@x.com\",\"subject\":\"S\",\"body\":\"B\",\"message_id\":\"m-1\"}";
    let ContentClassification::CompleteDirective {
        directive,
        text_before,
        text_after,
    } = classify(text)
    else {
        panic!("expected a complete directive");
    };
    assert_eq!(directive.kind(), DirectiveKind::EmailSuccess);
    assert!(text_before.is_empty());
    assert!(text_after.is_empty());

    let Directive::EmailSuccess(receipt) = directive else {
        panic!("expected an email receipt");
    };
    assert_eq!(receipt.delivery.message_id.as_deref(), Some("m-1"));
}

#[test]
fn test_sparse_persisted_receipts_keep_their_kind() {
    for text in [
        "{\"type\":\"email_success\",\"to\":\"a@x.com\",\"subject\":\"S\",\"message_id\":\"m1\"}",
        "{\"type\":\"email_success\"}",
    ] {
        assert_eq!(
            classify(text).kind(),
            Some(DirectiveKind::EmailSuccess),
            "text: {:?}",
            text
        );
    }
}

#[test]
fn test_null_cc_is_an_empty_list() {
    let text = "```json\n{\"to\":\"a@x.com\",\"subject\":\"S\",\"body\":\"B\",\"cc\":null}\n```";
    let Some(Directive::EmailDraft(draft)) = classify(text).directive().cloned() else {
        panic!("expected an email draft");
    };
    assert!(draft.cc.is_empty());
}

#[test]
fn test_email_draft_with_cc() {
    let result = classify(EMAIL_REPLY);
    assert_eq!(result.kind(), Some(DirectiveKind::EmailDraft));
    let ContentClassification::CompleteDirective {
        directive: Directive::EmailDraft(draft),
        text_before,
        text_after,
    } = result
    else {
        panic!("expected an email draft");
    };
    assert_eq!(draft.cc, vec!["inspectoria@colegio.cl".to_string()]);
    assert_eq!(draft.body, "Estimada familia,\nLos citamos el lunes.");
    assert_eq!(text_before, "Preparé este correo para la familia:");
    assert_eq!(text_after, "¿Quieres que lo envíe?");
}

#[test]
fn test_wrapped_calendar_draft() {
    let result = classify(CALENDAR_REPLY);
    assert_eq!(result.kind(), Some(DirectiveKind::CalendarDraft));
    let Some(Directive::CalendarDraft(draft)) = result.directive() else {
        panic!("expected a calendar draft");
    };
    assert_eq!(draft.summary, "Reunión de convivencia");
    assert!(draft.end() > draft.start());
}

#[test]
fn test_first_fence_wins() {
    let text = "Uno:\n```json\n{\"protocol_name\":\"A\",\"steps\":[]}\n```\nDos:\n```json\n{\"protocol_name\":\"B\",\"steps\":[]}\n```";
    let Some(Directive::Protocol(protocol)) = classify(text).directive().cloned() else {
        panic!("expected a protocol");
    };
    assert_eq!(protocol.protocol_name, "A");
}

#[test]
fn test_inline_fence_in_prose_before_the_draft() {
    let text = format!("Para código usa ``` al inicio.\n{}", EMAIL_REPLY);
    let ContentClassification::CompleteDirective {
        directive: Directive::EmailDraft(draft),
        text_before,
        text_after,
    } = classify(&text)
    else {
        panic!("expected an email draft");
    };
    assert_eq!(draft.to, "apoderado@familia.cl");
    assert!(text_before.ends_with("Preparé este correo para la familia:"));
    assert_eq!(text_after, "¿Quieres que lo envíe?");
}

#[test]
fn test_prose_is_plain_text() {
    for text in [
        "",
        "Hola, ¿en qué te ayudo?",
        "Usa `{}` para interpolar",
        "```python\nprint('hola')\n```",
    ] {
        assert_eq!(
            classify(text),
            ContentClassification::PlainText,
            "text: {:?}",
            text
        );
    }
}

#[test]
fn test_every_prefix_before_the_closing_fence_is_streaming() {
    for reply in [PROTOCOL_REPLY, EMAIL_REPLY, CALENDAR_REPLY] {
        let open = reply.find("```json").unwrap();
        let close = reply.rfind("```").unwrap();
        // From the full opening tag up to just before the closing fence
        let mut end = open + "```json".len();
        while end < close {
            if reply.is_char_boundary(end) {
                let prefix = &reply[..end];
                assert!(
                    matches!(
                        classify(prefix),
                        ContentClassification::StreamingDirective { .. }
                    ),
                    "prefix {:?} should be streaming",
                    prefix
                );
            }
            end += 1;
        }
    }
}

#[test]
fn test_split_reconstructs_the_reply() {
    for reply in [PROTOCOL_REPLY, EMAIL_REPLY] {
        let ContentClassification::CompleteDirective {
            text_before,
            text_after,
            ..
        } = classify(reply)
        else {
            panic!("expected a complete directive");
        };
        let open = reply.find("```json").unwrap();
        let close = reply.rfind("```").unwrap() + 3;
        assert_eq!(text_before, reply[..open].trim());
        assert_eq!(text_after, reply[close..].trim());
        let rebuilt = format!("{}\n{}\n{}", text_before, &reply[open..close], text_after);
        assert_eq!(classify(&rebuilt), classify(reply));
    }
}

#[test]
fn test_classification_is_idempotent() {
    for reply in [
        PROTOCOL_REPLY,
        EMAIL_REPLY,
        CALENDAR_REPLY,
        "texto",
        "```json\n{",
    ] {
        assert_eq!(classify(reply), classify(reply));
    }
}
