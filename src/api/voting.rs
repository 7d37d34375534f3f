use rocket::{http::Status, serde::json::Json, Route, State};

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        vote::{CastVote, CastVoteRequest, GenerateLinkRequest, LinkIssued, VoteReceipt},
        RequestContext,
    },
    store::Stores,
};
use crate::service::{BallotBox, VotingLinks};

use super::common::user_by_token;

pub fn routes() -> Vec<Route> {
    routes![generate_link, cast_vote, my_votes]
}

#[post("/votes/generate-link", data = "<request>", format = "json")]
async fn generate_link(
    token: AuthToken,
    request: Json<GenerateLinkRequest>,
    context: RequestContext,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<Json<LinkIssued>> {
    let user = user_by_token(&token, stores).await?;
    let issued = VotingLinks::new(config, stores, collaborators.notifier.as_ref())
        .issue(&user, *request.election_id, &context)
        .await?;
    Ok(Json(issued))
}

#[post("/votes/cast/<voting_token>", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken,
    voting_token: &str,
    request: Json<CastVoteRequest>,
    context: RequestContext,
    config: &State<Config>,
    stores: &State<Stores>,
    collaborators: &State<Collaborators>,
) -> Result<(Status, Json<CastVote>)> {
    request.validate()?;
    let vote = BallotBox::new(config, stores, collaborators)
        .cast(voting_token, token.id(), &request, &context)
        .await?;
    Ok((Status::Created, Json(vote)))
}

#[get("/votes/mine")]
async fn my_votes(token: AuthToken, stores: &State<Stores>) -> Result<Json<Vec<VoteReceipt>>> {
    let votes = stores.votes.by_voter(token.id()).await?;
    Ok(Json(votes.iter().map(VoteReceipt::from).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{json, serde_json, Value},
    };

    use crate::model::{
        api::ApiId,
        common::{election::NewElection, user::examples::EXAMPLE_EMAIL},
        memory::MemoryBackend,
        mongodb::Id,
    };

    use super::*;

    async fn request_link(client: &Client, election: ApiId) -> Status {
        client
            .post("/api/v1/votes/generate-link")
            .header(ContentType::JSON)
            .body(json!({ "electionId": election }).to_string())
            .dispatch()
            .await
            .status()
    }

    fn sent_token(backend: &MemoryBackend) -> String {
        let message = backend.outbox.last_to(EXAMPLE_EMAIL).unwrap().message;
        message.rsplit('/').next().unwrap().trim().to_string()
    }

    async fn cast(client: &Client, token: &str, body: Value) -> (Status, Value) {
        let response = client
            .post(format!("/api/v1/votes/cast/{token}"))
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json().await.unwrap_or(Value::Null))
    }

    #[backend_test(voter)]
    async fn link_then_vote(client: Client, backend: MemoryBackend) {
        let election = backend.elections.insert(NewElection::example());
        let candidate = election.candidates[0].id;

        assert_eq!(Status::Ok, request_link(&client, election.id.into()).await);
        let token = sent_token(&backend);

        let (status, body) = cast(
            &client,
            &token,
            json!({ "candidateId": ApiId::from(candidate) }),
        )
        .await;
        assert_eq!(Status::Created, status);
        let vote: CastVote = serde_json::from_value(body).unwrap();
        assert_eq!(*vote.election, election.id);
        assert_eq!(*vote.candidate, candidate);
        assert!(vote.attestation.is_some());
        assert!(vote.is_anonymous);

        // The link only works once.
        let (status, _) = cast(
            &client,
            &token,
            json!({ "candidateId": ApiId::from(candidate) }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);

        // No second link once voted.
        assert_eq!(Status::Conflict, request_link(&client, election.id.into()).await);

        let response = client.get("/api/v1/votes/mine").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let receipts: Vec<VoteReceipt> = response.into_json().await.unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].id, vote.id);
        assert_eq!(receipts[0].attestation, vote.attestation);
        assert_eq!(backend.votes.all().len(), 1);
    }

    #[backend_test(voter)]
    async fn unknown_election(client: Client) {
        let status = request_link(&client, Id::new().into()).await;
        assert_eq!(Status::NotFound, status);
    }

    #[backend_test(voter)]
    async fn finished_election(client: Client, backend: MemoryBackend) {
        let election = backend.elections.insert(NewElection::example_finished());
        let status = request_link(&client, election.id.into()).await;
        assert_eq!(Status::BadRequest, status);
        assert!(backend.outbox.last_to(EXAMPLE_EMAIL).is_none());
    }

    #[backend_test(voter)]
    async fn poor_face_match_is_refused(client: Client, backend: MemoryBackend) {
        let election = backend.elections.insert(NewElection::example());
        let candidate = election.candidates[1].id;
        backend.faces.set_score(70.0);
        request_link(&client, election.id.into()).await;
        let token = sent_token(&backend);

        let (status, body) = cast(
            &client,
            &token,
            json!({ "candidateId": ApiId::from(candidate), "faceImage": "c2VsZmll" }),
        )
        .await;
        assert_eq!(Status::Unauthorized, status);
        assert_eq!(body["error"], "Face verification failed");
        assert!(backend.votes.all().is_empty());
    }

    #[backend_test(voter)]
    async fn malformed_face_image(client: Client, backend: MemoryBackend) {
        let election = backend.elections.insert(NewElection::example());
        request_link(&client, election.id.into()).await;
        let token = sent_token(&backend);

        let (status, _) = cast(
            &client,
            &token,
            json!({
                "candidateId": ApiId::from(election.candidates[0].id),
                "faceImage": "not base64!",
            }),
        )
        .await;
        assert_eq!(Status::BadRequest, status);
        assert!(backend.votes.all().is_empty());
    }

    #[backend_test]
    async fn voting_needs_a_session(client: Client, backend: MemoryBackend) {
        let election = backend.elections.insert(NewElection::example());

        let status = request_link(&client, election.id.into()).await;
        assert_eq!(Status::Unauthorized, status);

        let (status, body) = cast(
            &client,
            &"ab".repeat(32),
            json!({ "candidateId": ApiId::from(election.candidates[0].id) }),
        )
        .await;
        assert_eq!(Status::Unauthorized, status);
        assert_eq!(body["error"], "Not authorized to access this route");

        let response = client.get("/api/v1/votes/mine").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
