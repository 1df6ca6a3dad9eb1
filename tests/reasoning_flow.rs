mod stub_llm;

use stub_llm::{fixture, StubLlmServer, TestResult};

use halcyon::core::agent::EMPTY_RESPONSE_DIAGNOSTIC;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plain_text_response_is_the_final_answer() -> TestResult<()> {
    let stub = StubLlmServer::start("this is just text").await?;
    let fx = fixture(&stub.base_url()).await?;

    let answer = fx.agent.lock().await.run("hi").await?;
    assert_eq!(answer, "this is just text");

    // Exactly one user row and one assistant row with that exact content.
    let log = fx.store.load_last_messages(10).await?;
    assert_eq!(log.len(), 2);
    assert_eq!((log[0].role.as_str(), log[0].content.as_str()), ("user", "hi"));
    assert_eq!(
        (log[1].role.as_str(), log[1].content.as_str()),
        ("assistant", "this is just text")
    );

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tagged_final_answer_is_extracted() -> TestResult<()> {
    let stub = StubLlmServer::start("unused").await?;
    stub.script(&[r#"<json>{"thought": "simple", "final": "blue, obviously"}</json>"#]);
    let fx = fixture(&stub.base_url()).await?;

    let answer = fx.agent.lock().await.run("what color?").await?;
    assert_eq!(answer, "blue, obviously");

    let log = fx.store.load_last_messages(10).await?;
    assert_eq!(log[1].content, "blue, obviously");

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tool_call_observation_feeds_next_iteration_without_persisting() -> TestResult<()> {
    let stub = StubLlmServer::start("unused").await?;
    stub.script(&[
        r#"<json>{"thought": "check memory", "tool": "recall", "input": "favorite color"}</json>"#,
        r#"<json>{"final": "you like blue"}</json>"#,
    ]);

    let fx = fixture(&stub.base_url()).await?;
    fx.store
        .save_memory("favorite color is blue", "preference", "")
        .await?;

    let answer = fx.agent.lock().await.run("what do I like?").await?;
    assert_eq!(answer, "you like blue");

    // Two model calls; the second carries the observation in-memory.
    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    let second_messages = requests[1]["messages"].as_array().unwrap();
    let observation = second_messages
        .iter()
        .find(|m| m["content"].as_str().unwrap_or("").starts_with("Observation:"))
        .expect("observation message present");
    assert!(observation["content"].as_str().unwrap().contains("favorite color is blue"));

    // The durable log holds only the user prompt and the final answer:
    // memory row aside, observations never reach the store.
    let log = fx.store.load_last_messages(10).await?;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].content, "you like blue");

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_tool_becomes_an_observation_and_the_loop_recovers() -> TestResult<()> {
    let stub = StubLlmServer::start("unused").await?;
    stub.script(&[
        r#"{"thought": "let me try", "tool": "teleport", "input": "home"}"#,
        r#"{"final": "never mind"}"#,
    ]);
    let fx = fixture(&stub.base_url()).await?;

    let answer = fx.agent.lock().await.run("go home").await?;
    assert_eq!(answer, "never mind");

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    let second_messages = requests[1]["messages"].as_array().unwrap();
    assert!(second_messages.iter().any(|m| m["content"]
        .as_str()
        .unwrap_or("")
        .contains("Error: Tool 'teleport' not found.")));

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn structured_tool_input_reaches_the_tool_as_compact_json() -> TestResult<()> {
    let stub = StubLlmServer::start("unused").await?;
    stub.script(&[
        r#"<json>{"tool": "remember", "input": {"content": "cat is orange", "kind": "fact"}}</json>"#,
        r#"<json>{"final": "noted"}</json>"#,
    ]);
    let fx = fixture(&stub.base_url()).await?;

    let answer = fx.agent.lock().await.run("remember the cat").await?;
    assert_eq!(answer, "noted");

    let memories = fx.store.search_memories("cat is orange", 5).await?;
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].kind, "fact");

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_model_response_yields_a_diagnostic_not_an_error() -> TestResult<()> {
    let stub = StubLlmServer::start("").await?;
    let fx = fixture(&stub.base_url()).await?;

    let answer = fx.agent.lock().await.run("hello?").await?;
    assert_eq!(answer, EMPTY_RESPONSE_DIAGNOSTIC);

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn vision_turn_attaches_images_once_and_marks_the_log() -> TestResult<()> {
    let stub = StubLlmServer::start("unused").await?;
    stub.script(&[
        r#"{"tool": "time", "input": ""}"#,
        r#"{"final": "a clock and a cat"}"#,
    ]);
    let fx = fixture(&stub.base_url()).await?;

    let answer = fx
        .agent
        .lock()
        .await
        .run_vision("what is this?", vec!["aGVsbG8=".to_string()])
        .await?;
    assert_eq!(answer, "a clock and a cat");

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    // The originating user message carries the image on every call of the
    // turn, but only that message ever does.
    for req in &requests {
        let with_images: Vec<_> = req["messages"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|m| m.get("images").is_some())
            .collect();
        assert_eq!(with_images.len(), 1);
        assert_eq!(with_images[0]["images"][0], "aGVsbG8=");
    }

    let log = fx.store.load_last_messages(10).await?;
    assert_eq!(log[0].content, "[Image Attached] what is this?");

    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn system_prompt_includes_persisted_memories() -> TestResult<()> {
    let stub = StubLlmServer::start("ok").await?;
    let fx = fixture(&stub.base_url()).await?;
    fx.store
        .save_memory("the dog is called Pixel", "fact", "pets")
        .await?;

    fx.agent.lock().await.run("hi").await?;

    let requests = stub.requests();
    let system = requests[0]["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("RELEVANT MEMORIES:"));
    assert!(system.contains("- [fact] the dog is called Pixel"));
    assert!(system.contains("- recall:"));

    stub.shutdown();
    Ok(())
}
